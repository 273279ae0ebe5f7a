//! Artalk Context CLI
//!
//! Answers a question, grounded on an artwork collection when one is given.

use anyhow::{bail, Context};
use artalk_common::{config::AppConfig, observability, VERSION};
use artalk_context::{create_generator, InMemoryCatalog, RagService};
use artalk_search::ContextRetriever;
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "context", about = "Answer a question grounded on an artwork collection", version)]
struct Cli {
    /// Collection to ground the answer on
    #[arg(long)]
    collection: Option<String>,

    /// Prompt template name
    #[arg(long)]
    template: Option<String>,

    /// JSON file holding the artwork catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Print the answer as it is generated
    #[arg(long)]
    stream: bool,

    /// List prompt templates and exit
    #[arg(long)]
    templates: bool,

    /// Question
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    observability::init_tracing(&config.observability);
    observability::init_metrics(&config.observability)?;

    info!("Starting Artalk Context v{}", VERSION);

    let catalog = match args.catalog {
        Some(ref path) => InMemoryCatalog::load_json(path)
            .await
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => InMemoryCatalog::new(),
    };
    let service = RagService::new(
        Arc::new(ContextRetriever::from_config(&config)?),
        Arc::new(catalog),
        create_generator(&config.generation)?,
    );

    if args.templates {
        for name in service.list_templates() {
            println!("{}", name);
        }
        return Ok(());
    }
    if args.query.is_empty() {
        bail!("a question is required unless --templates is given");
    }
    let query = args.query.join(" ");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_signal.cancel();
        }
    });

    let collection = args.collection.as_deref();
    let template = args.template.as_deref();

    if args.stream {
        let mut stream = service
            .answer_stream(&query, collection, template, &cancel)
            .await?;
        let mut stdout = std::io::stdout();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                part = stream.next() => match part {
                    Some(part) => {
                        write!(stdout, "{}", part?)?;
                        stdout.flush()?;
                    }
                    None => break,
                },
            }
        }
        println!();
    } else {
        let answer = service.answer(&query, collection, template, &cancel).await?;
        println!("{}", answer);
    }

    Ok(())
}
