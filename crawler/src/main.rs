use anyhow::Result;
use clap::Parser;
use crawler::{CrawlOptions, Crawler, HttpFetcher};
use searchcore::config::CrawlSettings;
use searchcore::html::tag_text;
use searchcore::model::normalize_base_url;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl one site and dump its pages to JSONL")]
struct Cli {
    /// Site base URL, e.g. https://example.com
    #[arg(long)]
    site: String,
    /// Output JSONL file path
    #[arg(long, default_value = "./sample_data/crawl.jsonl")]
    output: String,
    /// Concurrent fetches (defaults to available cores)
    #[arg(long)]
    workers: Option<usize>,
    /// Pause after each fetch, in milliseconds
    #[arg(long, default_value_t = 150)]
    delay_ms: u64,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent strings to rotate through (repeatable)
    #[arg(long = "user-agent")]
    user_agents: Vec<String>,
}

#[derive(Serialize)]
struct OutPage<'a> {
    id: String,
    url: &'a str,
    status: u16,
    title: String,
    bytes: usize,
    timestamp: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();
    if let Some(dir) = std::path::Path::new(&args.output).parent() {
        fs::create_dir_all(dir).ok();
    }

    let settings = CrawlSettings { delay_ms: args.delay_ms, timeout_secs: args.timeout_secs, user_agents: args.user_agents };
    let fetcher = Arc::new(HttpFetcher::new(&settings)?);
    let mut options = CrawlOptions { delay: Duration::from_millis(settings.delay_ms), ..Default::default() };
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    let seed = format!("{}/", normalize_base_url(&args.site));
    tracing::info!(%seed, workers = options.workers, output = %args.output, "crawl starting");

    let pages = Crawler::new(fetcher, options).crawl(&seed).await;

    let mut out = BufWriter::new(File::create(&args.output)?);
    let ts = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    for page in &pages {
        let mut hasher = Sha1::new();
        hasher.update(page.url.as_bytes());
        let rec = OutPage {
            id: format!("{:x}", hasher.finalize()),
            url: &page.url,
            status: page.status,
            title: tag_text(&page.html, "title"),
            bytes: page.html.len(),
            timestamp: ts.clone(),
        };
        serde_json::to_writer(&mut out, &rec)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    let failed = pages.iter().filter(|p| p.status >= 400).count();
    tracing::info!(pages = pages.len(), failed, output = %args.output, "done");
    Ok(())
}
