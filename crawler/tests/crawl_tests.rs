use async_trait::async_trait;
use crawler::{CrawlOptions, Crawler, FetchError, FetchedDocument, Fetcher, Url};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Serves canned pages and counts how often each URL is requested.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, (u16, String)>,
    hits: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, status: u16, links: &[&str]) -> Self {
        let anchors: String = links.iter().map(|l| format!(r#"<a href="{l}">link</a>"#)).collect();
        let html = format!("<html><head><title>{url}</title></head><body>{anchors}</body></html>");
        self.pages.insert(url.to_string(), (status, html));
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        tokio::time::sleep(Duration::from_millis(2)).await;
        match self.pages.get(url.as_str()) {
            Some((status, html)) => Ok(FetchedDocument { status: *status, html: html.clone() }),
            None => Err(FetchError::TooLarge(usize::MAX)),
        }
    }
}

fn options() -> CrawlOptions {
    CrawlOptions { delay: Duration::from_millis(1), workers: 4 }
}

#[tokio::test]
async fn crawls_site_once_per_url_in_url_order() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("https://a.org/", 200, &["/b", "/a", "https://other.org/", "/a#top", "/doc.pdf", "/"])
            .page("https://a.org/a", 200, &["/b", "/c", "/"])
            .page("https://a.org/b", 200, &["/a", "/c"])
            .page("https://a.org/c", 200, &["/a", "/b", "/c"]),
    );
    let crawler = Crawler::new(fetcher.clone(), options());
    let pages = crawler.crawl("https://a.org/").await;

    let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls.len(), 4);
    assert_eq!(urls[0], "https://a.org/");
    // children of the seed are joined in URL order
    let a = urls.iter().position(|u| *u == "https://a.org/a").unwrap();
    let b = urls.iter().position(|u| *u == "https://a.org/b").unwrap();
    assert!(a < b);
    for url in ["https://a.org/", "https://a.org/a", "https://a.org/b", "https://a.org/c"] {
        assert_eq!(fetcher.hits(url), 1, "{url}");
    }
    assert_eq!(fetcher.hits("https://other.org/"), 0);
    assert_eq!(fetcher.hits("https://a.org/doc.pdf"), 0);
}

#[tokio::test]
async fn failed_fetch_becomes_empty_500_page() {
    let fetcher = Arc::new(ScriptedFetcher::default().page("https://a.org/", 200, &["/missing", "/ok"]).page(
        "https://a.org/ok",
        200,
        &[],
    ));
    let pages = Crawler::new(fetcher, options()).crawl("https://a.org/").await;

    assert_eq!(pages.len(), 3);
    let missing = pages.iter().find(|p| p.url == "https://a.org/missing").unwrap();
    assert_eq!(missing.status, 500);
    assert!(missing.html.is_empty());
    assert!(pages.iter().filter(|p| p.url != "https://a.org/missing").all(|p| p.status == 200));
}

#[tokio::test]
async fn error_pages_are_kept_but_not_followed() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("https://a.org/", 200, &["/gone"])
            .page("https://a.org/gone", 404, &["/hidden"])
            .page("https://a.org/hidden", 200, &[]),
    );
    let pages = Crawler::new(fetcher.clone(), options()).crawl("https://a.org/").await;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].status, 404);
    assert_eq!(fetcher.hits("https://a.org/hidden"), 0);
}

#[tokio::test]
async fn crawl_output_is_stable_across_runs() {
    let build = || {
        Arc::new(
            ScriptedFetcher::default()
                .page("https://a.org/", 200, &["/z", "/m", "/a"])
                .page("https://a.org/z", 200, &["/z/1"])
                .page("https://a.org/z/1", 200, &[])
                .page("https://a.org/m", 200, &[])
                .page("https://a.org/a", 200, &[]),
        )
    };
    let first: Vec<String> = Crawler::new(build(), options()).crawl("https://a.org/").await.into_iter().map(|p| p.url).collect();
    let second: Vec<String> = Crawler::new(build(), options()).crawl("https://a.org/").await.into_iter().map(|p| p.url).collect();
    assert_eq!(first, second);
    assert_eq!(first, vec!["https://a.org/", "https://a.org/a", "https://a.org/m", "https://a.org/z", "https://a.org/z/1"]);
}
