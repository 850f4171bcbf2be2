use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid project path {path:?}: {reason}")]
    InvalidIncludePath { path: String, reason: &'static str },

    #[error("invalid data directory mode {0:#o}: must not exceed 0o7777")]
    InvalidMode(u32),

    #[error("invalid apt mirror host {0:?}: expected a host name like mirrors.example.com")]
    InvalidMirror(String),

    #[error("invalid environment variable name {0:?}")]
    InvalidEnvKey(String),

    // ── Application project discovery ──
    #[error("failed to resolve project directory {path}")]
    ProjectDirResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot derive a project name from {0}; set [project].name in dockyard.toml")]
    NoProjectName(PathBuf),

    #[error("package manifest not found at {0}; the build stage cannot resolve dependencies")]
    MissingManifest(PathBuf),

    #[error("entry point not found at {0}; set [app].entry_point in dockyard.toml")]
    MissingEntryPoint(PathBuf),
}
