//! Artalk Search CLI
//!
//! Prints the expanded context for a query, in document order.

use anyhow::Context;
use artalk_common::{config::AppConfig, observability, VERSION};
use artalk_search::{ContextRetriever, Retriever};
use clap::Parser;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "search", about = "Retrieve ordered context from a collection", version)]
struct Cli {
    /// Collection to search
    collection: String,

    /// Query text
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Similarity hits before expansion (defaults to vector_store.search_k)
    #[arg(short, long)]
    k: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    observability::init_tracing(&config.observability);
    observability::init_metrics(&config.observability)?;

    info!("Starting Artalk Search v{}", VERSION);

    if let Some(k) = cli.k {
        config.vector_store.search_k = k;
    }
    let query = cli.query.join(" ");
    let retriever = ContextRetriever::from_config(&config)?;

    // Ctrl-C stops an in-flight collection scan
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling retrieval");
            on_signal.cancel();
        }
    });

    let chunks = retriever.get_context(&query, &cli.collection, &cancel).await?;
    let out: Vec<_> = chunks
        .iter()
        .map(|c| {
            json!({
                "chunk_number": c.chunk_number,
                "source": c.source(),
                "text": c.text,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}
