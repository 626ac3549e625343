use colored::Colorize;
use ovhflow_cloud::StateManager;
use std::path::Path;

pub async fn handle(project_dir: &Path, resource_type: Option<&str>) -> anyhow::Result<()> {
    let manager = StateManager::new(project_dir);
    let state = manager.load().await?;

    let resources = match resource_type {
        Some(t) => state.resources_of_type(t),
        None => state.resources.iter().collect(),
    };

    if resources.is_empty() {
        println!("{}", "管理中のリソースはありません".dimmed());
        return Ok(());
    }

    println!("{}", "管理中のリソース:".bold());
    for (address, resource) in resources {
        let id = match resource.data.id() {
            Some(id) => id.normal(),
            None => "(作成未完了)".yellow(),
        };
        println!(
            "  {}  {}  {}",
            address.cyan(),
            id,
            resource
                .updated_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }
    Ok(())
}
