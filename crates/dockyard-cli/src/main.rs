mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "dockyard",
    about = "Assemble two-stage application images and provision host data directories"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the two-stage image definition
    BuildSpec {
        /// Output format
        #[arg(long, value_enum, default_value_t = SpecFormat::Dockerfile)]
        format: SpecFormat,
        /// Write the Dockerfile to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },
    /// Build every stage in order and tag the runtime image
    Assemble {
        /// Image tag (default: [project].image or "<name>:latest")
        #[arg(long, short = 't')]
        tag: Option<String>,
        /// Allow assembling with uncommitted changes
        #[arg(long)]
        allow_dirty: bool,
    },
    /// Create the shared data directory and normalize its mode and owner
    ProvisionDataDir {
        /// Data directory relative to the project root (default: [data_dir].path)
        #[arg(long)]
        path: Option<String>,
        /// Stop composed services and prune unused docker resources first
        #[arg(long)]
        reset: bool,
    },
    /// Check docker and project readiness
    Doctor,
    /// Write a dockyard.toml template
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum SpecFormat {
    Dockerfile,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildSpec {
            format,
            output,
            force,
        } => commands::build_spec(matches!(format, SpecFormat::Json), output.as_deref(), force)?,
        Commands::Assemble { tag, allow_dirty } => {
            commands::assemble(tag.as_deref(), allow_dirty).await?
        }
        Commands::ProvisionDataDir { path, reset } => {
            commands::provision_data_dir(path.as_deref(), reset).await?
        }
        Commands::Doctor => commands::doctor().await?,
        Commands::Init => commands::init_project()?,
    }

    Ok(())
}
