use std::fmt;
use std::path::Path;

use dockyard_core::ComposeConfig;

use crate::docker::DockerError;
use crate::executor::{DockerExecutor, RealExecutor};

/// Docker operations client, parameterized over the executor for testability.
pub struct DockerClient<E: DockerExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Image assembly ──

    /// Build `stages` in order from the context at `context_dir`.
    ///
    /// Every stage is built with `--target`; only the last one is tagged
    /// with `image`. A failing stage stops the sequence, so the tag is never
    /// produced unless every stage succeeded.
    pub async fn build_stages(
        &self,
        context_dir: &Path,
        stages: &[String],
        image: &str,
    ) -> Result<AssembleReport, BuildError> {
        let context = context_dir
            .to_str()
            .ok_or_else(|| BuildError::InvalidPath(context_dir.to_path_buf()))?;
        let last = stages.len().checked_sub(1).ok_or(BuildError::NoStages)?;

        let mut report = AssembleReport::default();
        for (index, stage) in stages.iter().enumerate() {
            let mut build_args = args(["build", "--target", stage.as_str()]);
            if index == last {
                build_args.extend(args(["--tag", image]));
            }
            build_args.push(context.to_owned());

            tracing::info!(stage = %stage, "building stage");
            self.executor
                .exec_streaming(&build_args)
                .await
                .map_err(|e| BuildError::Stage {
                    stage: stage.clone(),
                    source: e,
                })?;
            report.stages.push(stage.clone());
        }

        report.image = Some(image.to_owned());
        Ok(report)
    }

    // ── Cleanup ──

    /// Stop and remove the composed dependents (`docker compose down`).
    pub async fn compose_down(
        &self,
        project_dir: &Path,
        compose: &ComposeConfig,
    ) -> Result<String, DockerError> {
        let dir = project_dir.display().to_string();
        let mut compose_args = args(["compose", "--project-directory", dir.as_str()]);
        if let Some(file) = &compose.file {
            let file = project_dir.join(file).display().to_string();
            compose_args.extend(args(["-f", file.as_str()]));
        }
        if let Some(project) = &compose.project {
            compose_args.extend(args(["-p", project.as_str()]));
        }
        compose_args.push("down".to_owned());

        self.executor.exec(&compose_args).await
    }

    /// Remove unused local containers, networks, and dangling images.
    pub async fn system_prune(&self) -> Result<String, DockerError> {
        self.executor
            .exec(&args(["system", "prune", "-f"]))
            .await
    }

    // ── Doctor ──

    /// Check the docker CLI, daemon, and compose plugin without early return.
    ///
    /// Local project checks are left at their defaults for the caller to fill.
    pub async fn doctor(&self) -> DoctorReport {
        let mut report = DoctorReport::default();

        match self.executor.exec(&args(["--version"])).await {
            Ok(v) => {
                // "Docker version 27.3.1, build ce12230"
                let version = v
                    .trim()
                    .strip_prefix("Docker version ")
                    .and_then(|rest| rest.split(',').next())
                    .unwrap_or(v.trim());
                report.docker = CheckResult::ok(version);
            }
            Err(e) => {
                report.docker = CheckResult::fail(&e.to_string());
                report.daemon = CheckResult::fail("skipped");
                report.compose = CheckResult::fail("skipped");
                return report;
            }
        }

        match self
            .executor
            .exec(&args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(v) if !v.trim().is_empty() => report.daemon = CheckResult::ok(v.trim()),
            Ok(_) => report.daemon = CheckResult::fail("daemon reported no version"),
            Err(e) => {
                tracing::debug!(error = %e, "docker info failed");
                report.daemon = CheckResult::fail("daemon not reachable");
            }
        }

        match self
            .executor
            .exec(&args(["compose", "version", "--short"]))
            .await
        {
            Ok(v) => report.compose = CheckResult::ok(v.trim()),
            Err(e) => {
                tracing::debug!(error = %e, "docker compose version failed");
                report.compose = CheckResult::fail("docker compose plugin not available");
            }
        }

        report
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Report types ──

#[derive(Debug, Default)]
pub struct AssembleReport {
    /// Stages built, in order
    pub stages: Vec<String>,
    /// Tag of the runtime image; set only when every stage succeeded
    pub image: Option<String>,
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub docker: CheckResult,
    pub daemon: CheckResult,
    pub compose: CheckResult,
    pub config_file: CheckResult,
    pub manifest: CheckResult,
    pub entry_point: CheckResult,
    pub data_dir: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.rows().iter().all(|(_, r)| r.passed)
    }

    fn rows(&self) -> [(&'static str, &CheckResult); 7] {
        [
            ("docker CLI", &self.docker),
            ("docker daemon", &self.daemon),
            ("docker compose", &self.compose),
            ("dockyard.toml", &self.config_file),
            ("package manifest", &self.manifest),
            ("entry point", &self.entry_point),
            ("data directory", &self.data_dir),
        ]
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, result) in self.rows() {
            writeln!(f, "[{}] {label:<18} {}", result.icon(), result.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build context path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("no stages to build")]
    NoStages,

    #[error("stage '{stage}' failed; no runtime image was produced")]
    Stage { stage: String, source: DockerError },
}
