use std::path::{Path, PathBuf};

use crate::config::DockyardConfig;

/// The application being packaged, as found on the host.
///
/// Construction goes through [`AppProject::discover`], which checks that the
/// package manifest and the entry point exist before any build stage runs.
#[derive(Debug, Clone)]
pub struct AppProject {
    /// Project name (from `[project].name` or the directory name)
    pub name: String,
    /// Canonical project root
    pub root: PathBuf,
    /// Manifest path relative to `root`, as written in the Dockerfile
    pub manifest: String,
    /// Entry point relative to `root`, as written in the Dockerfile
    pub entry_point: String,
    /// Image reference the runtime stage is tagged with
    pub image: String,
}

impl AppProject {
    /// Discover the application at `project_dir` using `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectDirResolve`](crate::Error::ProjectDirResolve) if the directory cannot be canonicalized
    /// - [`Error::MissingManifest`](crate::Error::MissingManifest) if the manifest file is absent
    /// - [`Error::MissingEntryPoint`](crate::Error::MissingEntryPoint) if the entry point is absent
    pub fn discover(project_dir: &Path, config: &DockyardConfig) -> crate::Result<Self> {
        let root = project_dir
            .canonicalize()
            .map_err(|e| crate::Error::ProjectDirResolve {
                path: project_dir.to_path_buf(),
                source: e,
            })?;

        let manifest_path = root.join(&config.build.manifest);
        if !manifest_path.is_file() {
            return Err(crate::Error::MissingManifest(manifest_path));
        }

        let entry_path = root.join(&config.app.entry_point);
        if !entry_path.is_file() {
            return Err(crate::Error::MissingEntryPoint(entry_path));
        }

        let name = match &config.project.name {
            Some(name) => name.clone(),
            None => root
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned)
                .ok_or_else(|| crate::Error::NoProjectName(root.clone()))?,
        };

        let image = config
            .project
            .image
            .clone()
            .unwrap_or_else(|| format!("{}:latest", image_name(&name)));

        tracing::debug!(
            name = %name,
            image = %image,
            root = %root.display(),
            "application project discovered"
        );

        Ok(Self {
            name,
            root,
            manifest: config.build.manifest.clone(),
            entry_point: config.app.entry_point.clone(),
            image,
        })
    }
}

/// Normalize a project name into a valid image repository name.
///
/// Docker repository names are lowercase and limited to `[a-z0-9._-]`;
/// anything else becomes `-`.
pub fn image_name(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '.' | '_' | '-') => c,
            _ => '-',
        })
        .collect();
    let trimmed = normalized.trim_matches(|c| matches!(c, '.' | '_' | '-'));
    if trimmed.is_empty() {
        "app".to_owned()
    } else {
        trimmed.to_owned()
    }
}
