//! Export a project to a snapshot file, or import one, against the store
//! configured in the environment.
//!
//! Usage:
//!   cargo run --bin snapshot_tool -- export <project-id> --output-dir exports
//!   cargo run --bin snapshot_tool -- import exports/aquarium-export-....json --replace

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aquarium_tracker::{
    config::Config,
    db,
    snapshot::{self, codec, importer},
};

#[derive(Parser, Debug)]
#[command(name = "snapshot_tool", version, about = "Export and import aquarium projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a project and all its records to a JSON file
    Export {
        /// Project to export
        project_id: String,

        /// Directory the export file is written into
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Load a snapshot file as a new project
    Import {
        /// Snapshot file to read
        file: PathBuf,

        /// Overwrite the records of an existing project with the same name
        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let repo = db::connect(&config).await?;

    match cli.command {
        Command::Export { project_id, output_dir } => {
            let snapshot = snapshot::build_snapshot(repo.as_ref(), &project_id)
                .await
                .with_context(|| format!("failed to export project {project_id}"))?;
            let path = codec::save_to_dir(&snapshot, &output_dir).await?;
            println!("{}", path.display());
        }
        Command::Import { file, replace } => {
            let project_id = importer::import_from_file(repo.as_ref(), &file, replace)
                .await
                .with_context(|| format!("failed to import {}", file.display()))?;
            info!(project_id = %project_id, "Import finished");
            println!("{project_id}");
        }
    }
    Ok(())
}
