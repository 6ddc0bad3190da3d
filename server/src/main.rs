use anyhow::Result;
use axum::Router;
use clap::Parser;
use crawler::HttpFetcher;
use searchcore::config::AppConfig;
use searchcore::store::{SledStore, Store};
use server::{build_app, reindex_from_scratch, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Site list and crawl settings (JSON)
    #[arg(long, default_value = "./sites.json")]
    config: String,
    /// Store directory
    #[arg(long, default_value = "./data")]
    db: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Clear the store and index every configured site at startup
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    reindex_on_start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let store: Arc<dyn Store> = Arc::new(SledStore::open(&args.db)?);
    let fetcher = Arc::new(HttpFetcher::new(&config.crawl)?);
    tracing::info!(sites = config.sites.len(), db = %args.db, "configuration loaded");

    let state = AppState::new(config, store, fetcher);
    if args.reindex_on_start {
        reindex_from_scratch(&state)?;
    }
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
