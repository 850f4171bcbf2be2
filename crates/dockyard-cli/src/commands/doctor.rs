use std::os::unix::fs::MetadataExt;
use std::path::Path;

use dockyard_core::{CONFIG_FILE_NAME, DockyardConfig};
use dockyard_docker::{CheckResult, DockerClient};

pub async fn doctor() -> anyhow::Result<()> {
    let project_dir = Path::new(".");

    let client = DockerClient::new();
    let mut report = client.doctor().await;

    // An invalid config is reported, then defaults are used for the rest
    let config = match DockyardConfig::load(project_dir) {
        Ok(config) => {
            report.config_file = if project_dir.join(CONFIG_FILE_NAME).exists() {
                CheckResult::ok("Found")
            } else {
                CheckResult::ok("Not found (using defaults)")
            };
            config
        }
        Err(e) => {
            report.config_file = CheckResult::fail(&e.to_string());
            DockyardConfig::default()
        }
    };

    report.manifest = file_check(project_dir, &config.build.manifest);
    report.entry_point = file_check(project_dir, &config.app.entry_point);

    let data_dir = project_dir.join(&config.data_dir.path);
    report.data_dir = match std::fs::metadata(&data_dir) {
        Ok(meta) if meta.is_dir() => {
            let mode = meta.mode() & 0o7777;
            let detail = format!("{} ({mode:o}, {}:{})", config.data_dir.path, meta.uid(), meta.gid());
            if mode == config.data_dir.mode {
                CheckResult::ok(&detail)
            } else {
                CheckResult::fail(&format!(
                    "{detail}, expected {:o}; run `dockyard provision-data-dir`",
                    config.data_dir.mode
                ))
            }
        }
        Ok(_) => CheckResult::fail(&format!("{} is not a directory", config.data_dir.path)),
        Err(e) => {
            tracing::debug!(error = %e, path = %data_dir.display(), "data directory not readable");
            CheckResult::fail(&format!(
                "{} missing; run `dockyard provision-data-dir`",
                config.data_dir.path
            ))
        }
    };

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed; see above for details");
    }

    Ok(())
}

fn file_check(project_dir: &Path, relative: &str) -> CheckResult {
    if project_dir.join(relative).is_file() {
        CheckResult::ok(relative)
    } else {
        CheckResult::fail(&format!("{relative} not found"))
    }
}
