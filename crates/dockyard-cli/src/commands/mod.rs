mod assemble;
mod assemble_pipeline;
mod build_spec;
mod doctor;
mod init;
mod provision;

use std::path::Path;

use dockyard_build::ArtifactSpec;
use dockyard_core::{AppProject, DockyardConfig};

pub use assemble::assemble;
pub use build_spec::build_spec;
pub use doctor::doctor;
pub use init::init_project;
pub use provision::provision_data_dir;

/// Load the config, discover the application, and build a validated spec.
///
/// Nothing is executed; any error here is a definition error.
pub(crate) fn load_spec(
    project_dir: &Path,
) -> anyhow::Result<(DockyardConfig, AppProject, ArtifactSpec)> {
    let config = DockyardConfig::load(project_dir)?;
    let (project, spec) = spec_for(project_dir, &config)?;
    Ok((config, project, spec))
}

/// Discover the application under an already loaded `config` and validate its spec.
pub(crate) fn spec_for(
    project_dir: &Path,
    config: &DockyardConfig,
) -> anyhow::Result<(AppProject, ArtifactSpec)> {
    let project = AppProject::discover(project_dir, config)?;
    let spec = ArtifactSpec::from_config(config, &project);
    spec.validate()?;
    Ok((project, spec))
}
