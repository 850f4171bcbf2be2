use std::path::Path;

use dockyard_core::DockyardConfig;
use dockyard_host::{DataDirDescriptor, Identity, ProvisionMode, Provisioner};

/// Create the shared data directory and normalize its mode and ownership.
///
/// With `reset`, composed services are stopped and unused docker resources
/// pruned first; the directory contents are kept either way.
pub async fn provision_data_dir(path: Option<&str>, reset: bool) -> anyhow::Result<()> {
    // Identity first: nothing is touched if it cannot be resolved
    let identity = Identity::current()?;

    let project_dir = Path::new(".");
    let config = DockyardConfig::load(project_dir)?;
    let relative = path.unwrap_or(config.data_dir.path.as_str());
    let mode = ProvisionMode::from_reset_flag(reset);

    println!("Setting up data directory '{relative}'...");
    println!("Running as {identity}");
    if mode == ProvisionMode::ResetAndProvision {
        println!("Reset requested: stopping composed services and pruning unused docker resources");
    }

    let target = DataDirDescriptor::resolve(project_dir, relative, config.data_dir.mode, identity)?;
    let report = Provisioner::new(project_dir, config.compose.clone())
        .run(&target, mode)
        .await?;

    for step in &report.steps {
        println!("  {step}");
    }
    println!();
    println!(
        "Data directory ready: {} (mode {:o}, owner {})",
        report.path.display(),
        target.mode,
        report.identity
    );
    println!();
    print!("{}", report.listing);

    Ok(())
}
