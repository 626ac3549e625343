use anyhow::{anyhow, bail};
use colored::Colorize;
use ovhflow_cloud::StateManager;
use ovhflow_cloud::state::address;
use std::path::Path;

pub async fn handle(project_dir: &Path, resource_type: &str, name: &str) -> anyhow::Result<()> {
    super::ensure_known_type(resource_type)?;

    let manager = StateManager::new(project_dir);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let address = address(resource_type, name);
    let mut resource = state
        .get_resource(&address)
        .cloned()
        .ok_or_else(|| anyhow!("'{}' は state に存在しません", address))?;
    if resource.data.id().is_none() {
        bail!(
            "'{}' は作成が完了していません。確認後 delete で削除してください",
            address
        );
    }
    let mut data = resource.data.clone();

    let provider = super::load_provider()?;
    match provider.read(resource_type, &mut data).await {
        Ok(()) => {
            resource.refresh(data.clone());
            state.set_resource(address.clone(), resource);
        }
        Err(e) if e.is_not_found() => {
            println!(
                "{}",
                format!("ℹ '{}' はリモートに存在しません。state から削除します", address).dimmed()
            );
            state.remove_resource(&address);
        }
        Err(e) => return Err(e.into()),
    }

    manager.save(&state).await?;
    lock.release().await?;

    if state.get_resource(&address).is_some() {
        println!("{}", address.bold());
        super::print_attributes(&data);
    }
    Ok(())
}
