use anyhow::Result;
use clap::{Parser, Subcommand};
use crawler::HttpFetcher;
use indexer::IndexingCoordinator;
use searchcore::config::AppConfig;
use searchcore::lemmatizer::Lemmatizer;
use searchcore::store::{SledStore, Store};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Crawl configured sites and build their lemma index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every configured site from scratch and wait for completion
    Build {
        /// Site list and crawl settings (JSON)
        #[arg(long, default_value = "./sites.json")]
        config: String,
        /// Store directory
        #[arg(long, default_value = "./data")]
        db: String,
    },
    /// Print per-site status from an existing store
    Status {
        #[arg(long, default_value = "./data")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { config, db } => build(&config, &db).await,
        Commands::Status { db } => print_status(&SledStore::open(db)?),
    }
}

async fn build(config: &str, db: &str) -> Result<()> {
    let start = Instant::now();
    let config = AppConfig::load(config)?;
    let store: Arc<dyn Store> = Arc::new(SledStore::open(db)?);
    let fetcher = Arc::new(HttpFetcher::new(&config.crawl)?);
    let coordinator = IndexingCoordinator::new(config, store.clone(), fetcher, Arc::new(Lemmatizer::english()));

    coordinator.reset()?;
    coordinator.index_all();
    coordinator.wait_all().await;

    tracing::info!(elapsed_s = start.elapsed().as_secs_f64(), "index build complete");
    print_status(store.as_ref())
}

/// One JSON line per stored site.
fn print_status(store: &dyn Store) -> Result<()> {
    for site in store.list_sites()? {
        let line = json!({
            "url": site.url,
            "status": site.status,
            "statusTime": site.status_time.format(&Rfc3339)?,
            "pages": store.count_pages(site.id)?,
            "lemmas": store.count_lemmas(site.id)?,
            "lastError": site.last_error,
        });
        println!("{line}");
    }
    Ok(())
}
