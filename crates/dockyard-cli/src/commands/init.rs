use std::path::Path;

use dockyard_core::CONFIG_FILE_NAME;

const CONFIG_TEMPLATE: &str = r#"[project]
# name = "stock-analyzer"
# image = "stock-analyzer:latest"

[build]
# base_image = "python:3.11-slim"
# runtime_image = "python:3.11-slim"
# toolchain_packages = ["gcc"]
# manifest = "requirements.txt"
# bundle_dir = "/root/.local"
# runtime_dirs = ["data", "logs"]
# include = ["app/", "start_app.py"]
# pip_index_url = "https://pypi.org/simple"
# apt_mirror = "deb.debian.org"

[build.env]
# SKIP_INITIAL_DOWNLOAD = "true"

[app]
# workdir = "/app"
# interpreter = "python"
# entry_point = "start_app.py"
# port = 8888

[data_dir]
# path = "redis_data"
# mode = 0o755

[compose]
# file = "docker-compose.yml"
# project = "stock"
"#;

/// Write a commented `dockyard.toml` into the current directory.
pub fn init_project() -> anyhow::Result<()> {
    let config_path = Path::new(CONFIG_FILE_NAME);
    if config_path.exists() {
        eprintln!("{CONFIG_FILE_NAME} already exists, skipping");
        println!("Nothing to create, already initialized.");
        return Ok(());
    }

    std::fs::write(config_path, CONFIG_TEMPLATE)?;
    println!("Created {CONFIG_FILE_NAME}");

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Prepare the shared data directory:");
    println!("     dockyard provision-data-dir");
    println!();
    println!("  2. Inspect the generated image definition:");
    println!("     dockyard build-spec");
    println!();
    println!("  3. Build the runtime image:");
    println!("     dockyard assemble");

    Ok(())
}
