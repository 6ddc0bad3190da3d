pub mod crawl;
pub mod fetch;

pub use crawl::{CrawlOptions, CrawledPage, Crawler};
pub use fetch::{FetchError, FetchedDocument, Fetcher, HttpFetcher};
pub use url::Url;
