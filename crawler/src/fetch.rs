use async_trait::async_trait;
use reqwest::{header, Client};
use searchcore::config::CrawlSettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

/// Browser identities rotated across requests when none are configured.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub status: u16,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("document too large: {0} bytes")]
    TooLarge(usize),
}

/// One network call per URL, no retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    next: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(settings: &CrawlSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let user_agents = if settings.user_agents.is_empty() {
            USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            settings.user_agents.clone()
        };
        Ok(Self { client, user_agents, next: AtomicUsize::new(0) })
    }

    fn user_agent(&self) -> &str {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[i]
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.user_agent())
            .send()
            .await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(FetchError::TooLarge(bytes.len()));
        }
        Ok(FetchedDocument { status, html: String::from_utf8_lossy(&bytes).into_owned() })
    }
}
