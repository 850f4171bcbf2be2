use std::path::{Component, Path, PathBuf};

use crate::identity::Identity;
use crate::provision::ProvisionError;

/// Target state of the shared data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirDescriptor {
    /// Absolute path inside the project root
    pub path: PathBuf,
    /// Permission mask, e.g. `0o755`
    pub mode: u32,
    pub owner: Identity,
}

impl DataDirDescriptor {
    /// Resolve `relative` against `project_root` before anything is mutated.
    ///
    /// The result must stay inside the project root: lexically, and after
    /// following symlinks on the part of the path that already exists.
    pub fn resolve(
        project_root: &Path,
        relative: &str,
        mode: u32,
        owner: Identity,
    ) -> Result<Self, ProvisionError> {
        if mode > 0o7777 {
            return Err(ProvisionError::InvalidMode(mode));
        }

        let root = project_root
            .canonicalize()
            .map_err(|e| ProvisionError::ProjectRoot {
                path: project_root.to_path_buf(),
                source: e,
            })?;

        let mut path = root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => path.push(part),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ProvisionError::PathEscapesProject {
                        path: PathBuf::from(relative),
                        reason: "must be a relative path inside the project",
                    });
                }
            }
        }
        if path == root {
            return Err(ProvisionError::PathEscapesProject {
                path: PathBuf::from(relative),
                reason: "must not be the project root itself",
            });
        }

        // Symlinks along the existing prefix may still point elsewhere.
        let existing = path
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(root.as_path());
        let real = existing
            .canonicalize()
            .map_err(|e| ProvisionError::ProjectRoot {
                path: existing.to_path_buf(),
                source: e,
            })?;
        if !real.starts_with(&root) || (existing == path && real == root) {
            return Err(ProvisionError::PathEscapesProject {
                path,
                reason: "resolves outside the project",
            });
        }

        tracing::debug!(path = %path.display(), mode = format!("{mode:o}"), "data directory resolved");
        Ok(Self { path, mode, owner })
    }
}
