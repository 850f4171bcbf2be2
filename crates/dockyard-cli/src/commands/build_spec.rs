use std::path::Path;

use dockyard_build::DockerfileGenerator;

/// Render the validated image definition as a Dockerfile or as JSON.
pub fn build_spec(json: bool, output: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let (_, _, spec) = super::load_spec(Path::new("."))?;

    let rendered = if json {
        let mut s = serde_json::to_string_pretty(&spec)?;
        s.push('\n');
        s
    } else {
        DockerfileGenerator::new(&spec).render()
    };

    match output {
        Some(path) => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            std::fs::write(path, &rendered)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
