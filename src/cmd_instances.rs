//! Instance registry commands.

use autobridge_config::BridgeConfig;
use autobridge_registry::InstanceRegistry;

/// Print the registry table.
pub(crate) fn list_instances(
    config: &BridgeConfig,
    all: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = InstanceRegistry::from_config(&config.registry);
    let table = if all { registry.list()? } else { registry.live()? };

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    if table.is_empty() {
        println!("No bridge instances registered in {}", registry.path().display());
        return Ok(());
    }

    println!("{:<38} {:>6} {:>8}  {:<20} PROJECT", "INSTANCE", "PORT", "PID", "AGENT");
    for (id, record) in &table {
        println!(
            "{:<38} {:>6} {:>8}  {:<20} {}",
            id,
            record.port,
            record.pid,
            record.agent_name,
            record.project_path.display()
        );
    }

    Ok(())
}

/// Drop registry entries of dead or silent bridges.
pub(crate) fn cleanup_instances(config: &BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = InstanceRegistry::from_config(&config.registry);
    let removed = registry.cleanup_stale_entries()?;
    if removed.is_empty() {
        println!("No stale instances");
        return Ok(());
    }
    for id in &removed {
        println!("Removed {}", id);
    }
    println!("{} stale instance(s) removed", removed.len());
    Ok(())
}
