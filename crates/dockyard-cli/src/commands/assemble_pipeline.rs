use std::path::Path;

use dockyard_build::DockerfileGenerator;
use dockyard_build::bundle;
use dockyard_core::DockyardConfig;
use dockyard_docker::{DockerClient, DockerExecutor};

/// Result of a successful assembly.
pub(crate) struct AssembleOutcome {
    pub steps: Vec<String>,
    /// Tag of the runtime image
    pub image: String,
}

/// Run the assembly pipeline: dirty check → spec → bundle → staged build.
///
/// Every definition error surfaces before the first `docker build`.
pub(crate) async fn run<E: DockerExecutor>(
    client: &DockerClient<E>,
    project_dir: &Path,
    tag: Option<&str>,
    allow_dirty: bool,
) -> anyhow::Result<AssembleOutcome> {
    let mut steps = Vec::new();

    let config = DockyardConfig::load(project_dir)?;
    // Generated and service-written paths never count as changes
    let excludes = [config.data_dir.path.as_str()];

    // Dirty check
    if !allow_dirty && bundle::is_dirty(project_dir, &excludes)? {
        anyhow::bail!(
            "uncommitted changes detected.\n\
             Commit your changes, or use `dockyard assemble --allow-dirty` to build anyway."
        );
    }

    let (project, spec) = super::spec_for(project_dir, &config)?;
    let image = tag.unwrap_or(project.image.as_str()).to_owned();
    steps.push(format!(
        "Image definition validated ({} stages)",
        spec.stages.len()
    ));

    let dockerfile = DockerfileGenerator::new(&spec).render();
    let bundle_dir = bundle::create_bundle(project_dir, &dockerfile, &excludes)?;
    steps.push(format!("Build context bundled at {}", bundle_dir.display()));

    let stages: Vec<String> = spec.stages.iter().map(|s| s.name.clone()).collect();
    let report = client.build_stages(&bundle_dir, &stages, &image).await?;
    for stage in &report.stages {
        steps.push(format!("Stage '{stage}' built"));
    }

    Ok(AssembleOutcome { steps, image })
}
