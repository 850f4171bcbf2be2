use std::collections::HashMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "dockyard.toml";

/// dockyard.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockyardConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub data_dir: DataDirConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (defaults to the project directory name)
    pub name: Option<String>,
    /// Image reference for the runtime stage (defaults to `<name>:latest`)
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Image for the build stage (carries the toolchain)
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// Minimal image for the runtime stage
    #[serde(default = "default_runtime_image")]
    pub runtime_image: String,
    /// System packages installed into the build stage only
    #[serde(default = "default_toolchain_packages")]
    pub toolchain_packages: Vec<String>,
    /// Package manifest resolved in the build stage, relative to the project root
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// User-local directory the manifest is resolved into.
    /// This is the only build-stage path the runtime stage copies.
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: String,
    /// Empty directories created in the runtime stage, relative to `app.workdir`
    #[serde(default = "default_runtime_dirs")]
    pub runtime_dirs: Vec<String>,
    /// Files/directories to copy into the runtime image.
    /// When None, the entire bundle is copied (COPY . .).
    /// When Some, only the specified paths are copied.
    #[serde(default)]
    pub include: Option<Vec<String>>,
    /// Package index override, applied to every stage
    #[serde(default)]
    pub pip_index_url: Option<String>,
    /// Debian mirror host replacing deb.debian.org, applied to every stage
    #[serde(default)]
    pub apt_mirror: Option<String>,
    /// Static environment variables baked into the runtime image.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application root inside the image
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Interpreter that runs the entry point
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Single entry point, relative to the project root
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Port the application listens on (image metadata only)
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDirConfig {
    /// Directory mounted by the cache service, relative to the project root
    #[serde(default = "default_data_dir_path")]
    pub path: String,
    /// Permission mask asserted on every provisioning run
    #[serde(default = "default_data_dir_mode")]
    pub mode: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Compose file passed with `-f` (docker default lookup when None)
    pub file: Option<String>,
    /// Compose project name passed with `-p`
    pub project: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            runtime_image: default_runtime_image(),
            toolchain_packages: default_toolchain_packages(),
            manifest: default_manifest(),
            bundle_dir: default_bundle_dir(),
            runtime_dirs: default_runtime_dirs(),
            include: None,
            pip_index_url: None,
            apt_mirror: None,
            env: HashMap::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            interpreter: default_interpreter(),
            entry_point: default_entry_point(),
            port: default_port(),
        }
    }
}

impl Default for DataDirConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir_path(),
            mode: default_data_dir_mode(),
        }
    }
}

impl DockyardConfig {
    /// Load from dockyard.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE_NAME);
        let config: Self = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file; using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject host-relative paths that could reach outside the project tree.
    pub fn validate(&self) -> crate::Result<()> {
        check_relative(&self.build.manifest)?;
        check_relative(&self.app.entry_point)?;
        check_relative(&self.data_dir.path)?;
        for path in self.build.include.iter().flatten() {
            check_relative(path)?;
        }
        for dir in &self.build.runtime_dirs {
            check_relative(dir)?;
        }
        if self.data_dir.mode > 0o7777 {
            return Err(crate::Error::InvalidMode(self.data_dir.mode));
        }
        if let Some(host) = &self.build.apt_mirror {
            check_mirror_host(host)?;
        }
        for key in self.build.env.keys() {
            check_env_key(key)?;
        }
        Ok(())
    }
}

/// Checks that `path` is a non-empty relative path without `..` components.
pub fn check_relative(path: &str) -> crate::Result<()> {
    let invalid = |reason| crate::Error::InvalidIncludePath {
        path: path.to_owned(),
        reason,
    };

    if path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    let parsed = Path::new(path);
    if parsed.is_absolute() {
        return Err(invalid("absolute paths are not allowed"));
    }
    if parsed
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(invalid("parent directory components are not allowed"));
    }
    Ok(())
}

/// Mirror hosts are spliced into a `sed` expression in a `RUN` line.
fn check_mirror_host(host: &str) -> crate::Result<()> {
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/'));
    if valid {
        Ok(())
    } else {
        Err(crate::Error::InvalidMirror(host.to_owned()))
    }
}

fn check_env_key(key: &str) -> crate::Result<()> {
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(crate::Error::InvalidEnvKey(key.to_owned()))
    }
}

fn default_base_image() -> String {
    "python:3.11-slim".to_owned()
}

fn default_runtime_image() -> String {
    "python:3.11-slim".to_owned()
}

fn default_toolchain_packages() -> Vec<String> {
    vec!["gcc".to_owned()]
}

fn default_manifest() -> String {
    "requirements.txt".to_owned()
}

fn default_bundle_dir() -> String {
    "/root/.local".to_owned()
}

fn default_runtime_dirs() -> Vec<String> {
    vec!["data".to_owned(), "logs".to_owned()]
}

fn default_workdir() -> String {
    "/app".to_owned()
}

fn default_interpreter() -> String {
    "python".to_owned()
}

fn default_entry_point() -> String {
    "start_app.py".to_owned()
}

fn default_port() -> u16 {
    8888
}

fn default_data_dir_path() -> String {
    "redis_data".to_owned()
}

fn default_data_dir_mode() -> u32 {
    0o755
}
