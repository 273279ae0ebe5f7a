//! Artalk Ingestion CLI
//!
//! Loads PDFs into a numbered collection, and manages existing collections.

use anyhow::Context;
use artalk_common::{config::AppConfig, observability, VERSION};
use artalk_ingestion::IngestionProcessor;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ingestion", about = "Artalk document ingestion", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Partition, chunk, number and index a PDF file or directory
    Ingest {
        /// PDF file, or directory scanned for PDFs
        path: PathBuf,
        /// Target collection name
        collection: String,
    },

    /// Delete a collection
    Delete {
        collection: String,
    },

    /// List collections
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    observability::init_tracing(&config.observability);
    observability::init_metrics(&config.observability)?;

    info!("Starting Artalk Ingestion v{}", VERSION);

    let processor = IngestionProcessor::from_config(&config)?;

    match cli.command {
        Command::List => {
            for name in processor.list_collections().await? {
                println!("{}", name);
            }
        }
        Command::Delete { collection } => {
            let existed = processor.delete_collection(&collection).await?;
            println!("{}", if existed { "deleted" } else { "not found" });
        }
        Command::Ingest { path, collection } => {
            let report = processor
                .ingest_path(&path, &collection)
                .await
                .with_context(|| format!("Ingestion of {} failed", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
