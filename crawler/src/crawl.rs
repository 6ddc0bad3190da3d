use crate::fetch::Fetcher;
use parking_lot::Mutex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use url::Url;

/// Links ending in these are never followed.
const DENIED_EXTENSIONS: [&str; 4] = [".pdf", ".jpg", ".JPG", ".png"];

/// Status recorded for a URL that could not be fetched.
pub const FAILED_FETCH_STATUS: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawledPage {
    pub url: String,
    pub html: String,
    pub status: u16,
}

impl CrawledPage {
    fn failed(url: String) -> Self {
        Self { url, html: String::new(), status: FAILED_FETCH_STATUS }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Pause each task takes after its fetch.
    pub delay: Duration,
    /// Upper bound on concurrent fetches.
    pub workers: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { delay: Duration::from_millis(150), workers }
    }
}

/// Recursive same-site crawler: one task per discovered URL, each URL fetched at most once.
#[derive(Clone)]
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    options: CrawlOptions,
}

struct CrawlContext {
    seed: String,
    fetcher: Arc<dyn Fetcher>,
    seen: Mutex<HashSet<String>>,
    permits: Semaphore,
    delay: Duration,
}

type CrawlTask = Pin<Box<dyn Future<Output = Vec<CrawledPage>> + Send>>;

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: CrawlOptions) -> Self {
        Self { fetcher, options }
    }

    /// Every page reachable from `seed` whose URL starts with `seed`.
    ///
    /// The seed page comes first, followed by each child subtree in URL order.
    /// Failed fetches appear as empty pages with status 500.
    pub async fn crawl(&self, seed: &str) -> Vec<CrawledPage> {
        let ctx = Arc::new(CrawlContext {
            seed: seed.to_string(),
            fetcher: self.fetcher.clone(),
            seen: Mutex::new(HashSet::new()),
            permits: Semaphore::new(self.options.workers.max(1)),
            delay: self.options.delay,
        });
        ctx.claim(seed);
        let pages = visit(ctx.clone(), seed.to_string()).await;
        tracing::info!(seed, pages = pages.len(), "crawl finished");
        pages
    }
}

impl CrawlContext {
    /// Atomically marks `url` as taken; false when another task already has it.
    fn claim(&self, url: &str) -> bool {
        self.seen.lock().insert(url.to_string())
    }

    fn admits(&self, url: &str) -> bool {
        url.starts_with(&self.seed)
            && !url.contains('#')
            && !DENIED_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
    }

    async fn fetch_page(&self, url: &str) -> (CrawledPage, Vec<String>) {
        // the semaphore is never closed
        let _permit = self.permits.acquire().await.ok();
        let result = match Url::parse(url) {
            Ok(parsed) => match self.fetcher.fetch(&parsed).await {
                Ok(doc) => {
                    let links = if doc.status < 400 { extract_links(&parsed, &doc.html) } else { Vec::new() };
                    (CrawledPage { url: url.to_string(), html: doc.html, status: doc.status }, links)
                }
                Err(err) => {
                    tracing::debug!(url, %err, "fetch failed");
                    (CrawledPage::failed(url.to_string()), Vec::new())
                }
            },
            Err(err) => {
                tracing::debug!(url, %err, "unparseable url");
                (CrawledPage::failed(url.to_string()), Vec::new())
            }
        };
        sleep(self.delay).await;
        result
    }
}

fn visit(ctx: Arc<CrawlContext>, url: String) -> CrawlTask {
    Box::pin(async move {
        let (page, links) = ctx.fetch_page(&url).await;
        let mut children: Vec<_> = links
            .into_iter()
            .filter(|link| ctx.admits(link) && ctx.claim(link))
            .map(|link| {
                let handle = tokio::spawn(visit(ctx.clone(), link.clone()));
                (link, handle)
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));

        let mut pages = vec![page];
        for (link, handle) in children {
            match handle.await {
                Ok(mut subtree) => pages.append(&mut subtree),
                Err(err) => {
                    tracing::warn!(url = %link, %err, "crawl task aborted");
                    pages.push(CrawledPage::failed(link));
                }
            }
        }
        pages
    })
}

/// Absolute http(s) targets of every `a[href]` in the document.
pub fn extract_links(base: &Url, html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .map(|u| u.to_string())
        .collect()
}
