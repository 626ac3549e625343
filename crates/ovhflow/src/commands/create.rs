use anyhow::bail;
use colored::Colorize;
use ovhflow_cloud::state::address;
use ovhflow_cloud::{CloudError, ManagedResource, ResourceData, StateManager};
use std::path::Path;

pub async fn handle(
    project_dir: &Path,
    resource_type: &str,
    name: &str,
    attributes: &[String],
) -> anyhow::Result<()> {
    super::ensure_known_type(resource_type)?;

    let mut data = ResourceData::new();
    for raw in attributes {
        let (key, value) = super::parse_attribute(raw)?;
        data.set(key, value);
    }

    let provider = super::load_provider()?;
    let manager = StateManager::new(project_dir);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let address = address(resource_type, name);
    if state.get_resource(&address).is_some() {
        bail!(
            "'{}' は既に state に存在します。先に delete してください",
            address
        );
    }

    println!("{}", format!("'{}' を作成中...", address).yellow());

    if let Err(e) = provider.create(resource_type, &mut data).await {
        // once the creating request went through, the remote object exists
        if matches!(e, CloudError::Convergence { .. }) || data.id().is_some() {
            eprintln!(
                "{}",
                "作成は受け付けられましたが完了を確認できませんでした。リモートに残っているリソースを state に記録します:"
                    .yellow()
            );
            super::print_attributes(&data);
            eprintln!(
                "  {}",
                format!(
                    "確認後 'ovhflow delete {} {}' で削除できます",
                    resource_type, name
                )
                .dimmed()
            );
            state.set_resource(address.clone(), ManagedResource::new(resource_type, data));
            manager.save(&state).await?;
        }
        return Err(e.into());
    }

    state.set_resource(
        address.clone(),
        ManagedResource::new(resource_type, data.clone()),
    );
    manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", format!("✓ '{}' を作成しました", address).green().bold());
    if let Some(id) = data.id() {
        println!("  ID: {}", id.cyan());
    }
    super::print_attributes(&data);

    Ok(())
}
