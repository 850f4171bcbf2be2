use std::path::Path;

use dockyard_docker::DockerClient;

/// Assemble the runtime image from the project in the current directory.
pub async fn assemble(tag: Option<&str>, allow_dirty: bool) -> anyhow::Result<()> {
    let client = DockerClient::new();

    println!("Assembling image...");
    let outcome = super::assemble_pipeline::run(&client, Path::new("."), tag, allow_dirty).await?;

    for step in &outcome.steps {
        println!("  {step}");
    }
    println!();
    println!("Assembled: {}", outcome.image);

    Ok(())
}
