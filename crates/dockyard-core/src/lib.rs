//! Core types and configuration for dockyard.
//!
//! This crate defines the `dockyard.toml` schema ([`DockyardConfig`]),
//! application discovery ([`AppProject`]), and shared error types.

pub mod config;
pub mod error;
pub mod project;

pub use config::{
    AppConfig, BuildConfig, CONFIG_FILE_NAME, ComposeConfig, DataDirConfig, DockyardConfig,
    ProjectConfig,
};
pub use error::{Error, Result};
pub use project::AppProject;
