use std::fmt;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use dockyard_core::ComposeConfig;
use dockyard_docker::{DockerClient, DockerError, DockerExecutor, RealExecutor};
use nix::errno::Errno;
use nix::unistd::{Gid, Uid, chown};

use crate::descriptor::DataDirDescriptor;
use crate::identity::{Identity, IdentityError};
use crate::listing::DirListing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProvisionMode {
    /// Create if absent, then normalize permissions and ownership
    #[default]
    ProvisionOnly,
    /// Stop composed dependents and prune local resources first
    ResetAndProvision,
}

impl ProvisionMode {
    pub fn from_reset_flag(reset: bool) -> Self {
        if reset {
            Self::ResetAndProvision
        } else {
            Self::ProvisionOnly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepName {
    StopDependents,
    PruneResources,
    Create,
    SetPermissions,
    SetOwnership,
    Verify,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StopDependents => "stop-dependents",
            Self::PruneResources => "prune-resources",
            Self::Create => "create",
            Self::SetPermissions => "set-permissions",
            Self::SetOwnership => "set-ownership",
            Self::Verify => "verify",
        }
    }

    /// Cleanup steps may fail without failing the run.
    pub fn is_best_effort(self) -> bool {
        matches!(self, Self::StopDependents | Self::PruneResources)
    }

    /// Ordered step list for `mode`.
    pub fn plan(mode: ProvisionMode) -> Vec<StepName> {
        let mut steps = Vec::with_capacity(6);
        if mode == ProvisionMode::ResetAndProvision {
            steps.extend([Self::StopDependents, Self::PruneResources]);
        }
        steps.extend([
            Self::Create,
            Self::SetPermissions,
            Self::SetOwnership,
            Self::Verify,
        ]);
        steps
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done(String),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: StepName,
    pub outcome: StepOutcome,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            StepOutcome::Done(detail) => write!(f, "[OK]   {:<16} {detail}", self.step),
            StepOutcome::Skipped(reason) => write!(f, "[SKIP] {:<16} {reason}", self.step),
        }
    }
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub path: PathBuf,
    pub mode: ProvisionMode,
    pub identity: Identity,
    pub steps: Vec<StepRecord>,
    pub listing: DirListing,
}

/// Runs the named provisioning steps in order against one data directory.
pub struct Provisioner<E: DockerExecutor = RealExecutor> {
    client: DockerClient<E>,
    project_dir: PathBuf,
    compose: ComposeConfig,
}

impl Provisioner<RealExecutor> {
    pub fn new(project_dir: &Path, compose: ComposeConfig) -> Self {
        Self::with_client(DockerClient::new(), project_dir, compose)
    }
}

impl<E: DockerExecutor> Provisioner<E> {
    pub fn with_client(client: DockerClient<E>, project_dir: &Path, compose: ComposeConfig) -> Self {
        Self {
            client,
            project_dir: project_dir.to_path_buf(),
            compose,
        }
    }

    /// Bring `target` into its described state.
    ///
    /// Halts on the first failing step except the reset cleanup, which is
    /// recorded as skipped.
    pub async fn run(
        &self,
        target: &DataDirDescriptor,
        mode: ProvisionMode,
    ) -> Result<ProvisionReport, ProvisionError> {
        let mut steps = Vec::new();

        for step in StepName::plan(mode) {
            tracing::info!(%step, path = %target.path.display(), "step started");
            let fail = |source| ProvisionError::Step { step, source };
            let path = &target.path;
            let outcome = match step {
                StepName::StopDependents => cleanup(
                    step,
                    self.client
                        .compose_down(&self.project_dir, &self.compose)
                        .await
                        .map(|_| "composed services stopped".to_owned()),
                ),
                StepName::PruneResources => cleanup(
                    step,
                    self.client
                        .system_prune()
                        .await
                        .map(|out| summarize_prune(&out)),
                ),
                StepName::Create => StepOutcome::Done(create(path).map_err(fail)?),
                StepName::SetPermissions => {
                    StepOutcome::Done(set_permissions(path, target.mode).map_err(fail)?)
                }
                StepName::SetOwnership => StepOutcome::Done(
                    set_ownership(path, target.owner.uid, target.owner.gid).map_err(fail)?,
                ),
                StepName::Verify => StepOutcome::Done(verify(target).map_err(fail)?),
            };
            steps.push(StepRecord { step, outcome });
        }

        let listing = DirListing::read(&target.path).map_err(|e| ProvisionError::Step {
            step: StepName::Verify,
            source: StepError::Listing {
                path: target.path.clone(),
                source: e,
            },
        })?;

        tracing::info!(path = %target.path.display(), "data directory provisioned");
        Ok(ProvisionReport {
            path: target.path.clone(),
            mode,
            identity: target.owner.clone(),
            steps,
            listing,
        })
    }
}

fn cleanup(step: StepName, result: Result<String, DockerError>) -> StepOutcome {
    match result {
        Ok(detail) => StepOutcome::Done(detail),
        Err(e) => {
            tracing::warn!(%step, error = %e, "cleanup step failed; continuing");
            StepOutcome::Skipped(e.to_string())
        }
    }
}

fn summarize_prune(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map_or_else(|| "nothing to prune".to_owned(), |l| l.trim().to_owned())
}

// ── Filesystem steps ──

fn create(path: &Path) -> Result<String, StepError> {
    if path.is_dir() {
        return Ok("already exists".to_owned());
    }
    if path.exists() || path.is_symlink() {
        return Err(StepError::NotADirectory(path.to_path_buf()));
    }

    fs::create_dir_all(path).map_err(|e| StepError::Create {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok("created".to_owned())
}

fn set_permissions(path: &Path, mode: u32) -> Result<String, StepError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        StepError::Permissions {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    Ok(format!("{mode:o}"))
}

fn set_ownership(path: &Path, uid: Uid, gid: Gid) -> Result<String, StepError> {
    chown(path, Some(uid), Some(gid)).map_err(|e| StepError::Ownership {
        path: path.to_path_buf(),
        uid: uid.as_raw(),
        gid: gid.as_raw(),
        hint: if e == Errno::EPERM {
            " (changing ownership to another user requires elevated privileges)"
        } else {
            ""
        },
        source: e,
    })?;
    Ok(format!("{uid}:{gid}"))
}

fn verify(target: &DataDirDescriptor) -> Result<String, StepError> {
    let meta = fs::metadata(&target.path).map_err(|e| StepError::Listing {
        path: target.path.clone(),
        source: e,
    })?;

    let mut problems = Vec::new();
    if !meta.is_dir() {
        problems.push("not a directory".to_owned());
    }
    let mode = meta.mode() & 0o7777;
    if mode != target.mode {
        problems.push(format!("mode {mode:o}, expected {:o}", target.mode));
    }
    if meta.uid() != target.owner.uid.as_raw() || meta.gid() != target.owner.gid.as_raw() {
        problems.push(format!(
            "owner {}:{}, expected {}:{}",
            meta.uid(),
            meta.gid(),
            target.owner.uid,
            target.owner.gid
        ));
    }

    if problems.is_empty() {
        Ok(format!("{mode:o} {}:{}", meta.uid(), meta.gid()))
    } else {
        Err(StepError::Verify {
            path: target.path.clone(),
            detail: problems.join(", "),
        })
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to create {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} exists and is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to set permissions on {path}")]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to change owner of {path} to {uid}:{gid}{hint}")]
    Ownership {
        path: PathBuf,
        uid: u32,
        gid: u32,
        hint: &'static str,
        source: nix::Error,
    },

    #[error("{path} does not match the requested state: {detail}")]
    Verify { path: PathBuf, detail: String },

    #[error("failed to read {path}")]
    Listing {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("failed to resolve project directory {path}")]
    ProjectRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("data directory {path} is not usable: {reason}")]
    PathEscapesProject { path: PathBuf, reason: &'static str },

    #[error("permission mask {0:o} is out of range (max 7777)")]
    InvalidMode(u32),

    #[error("step '{step}' failed")]
    Step { step: StepName, source: StepError },
}

impl ProvisionError {
    /// The step that failed, if the error came from the runner.
    pub fn step(&self) -> Option<StepName> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}
