use anyhow::anyhow;
use colored::Colorize;
use ovhflow_cloud::StateManager;
use ovhflow_cloud::state::address;
use std::io::Write;
use std::path::Path;

fn confirm(address: &str) -> anyhow::Result<bool> {
    print!("'{}' を削除します。よろしいですか？ [y/N]: ", address);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn handle(
    project_dir: &Path,
    resource_type: &str,
    name: &str,
    yes: bool,
) -> anyhow::Result<()> {
    super::ensure_known_type(resource_type)?;

    let manager = StateManager::new(project_dir);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let address = address(resource_type, name);
    let mut data = state
        .get_resource(&address)
        .map(|r| r.data.clone())
        .ok_or_else(|| anyhow!("'{}' は state に存在しません", address))?;

    if !yes && !confirm(&address)? {
        println!("{}", "キャンセルしました".yellow());
        return Ok(());
    }

    let provider = super::load_provider()?;
    println!("{}", format!("'{}' を削除中...", address).yellow());
    if data.id().is_some() {
        provider.delete(resource_type, &mut data).await?;
    } else {
        // left behind by an interrupted create
        provider.discard(resource_type, &mut data).await?;
    }

    state.remove_resource(&address);
    manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", format!("✓ '{}' を削除しました", address).green().bold());
    Ok(())
}
