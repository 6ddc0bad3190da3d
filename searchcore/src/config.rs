use crate::model::normalize_base_url;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Pause after each fetch, per crawl task.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Client identities rotated across requests; a built-in list is used when empty.
    #[serde(default)]
    pub user_agents: Vec<String>,
}
fn default_delay_ms() -> u64 { 150 }
fn default_timeout_secs() -> u64 { 12 }

impl Default for CrawlSettings {
    fn default() -> Self {
        Self { delay_ms: default_delay_ms(), timeout_secs: default_timeout_secs(), user_agents: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub crawl: CrawlSettings,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validated()
    }

    /// Normalises base URLs and rejects empty or duplicate entries.
    pub fn validated(mut self) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for site in self.sites.iter_mut() {
            site.url = normalize_base_url(&site.url);
            if site.url.is_empty() {
                bail!("site {:?} has an empty url", site.name);
            }
            if !seen.insert(site.url.clone()) {
                bail!("site {} is configured twice", site.url);
            }
        }
        Ok(self)
    }

    /// Exact base-URL match against the configured list.
    pub fn site(&self, url: &str) -> Option<&SiteConfig> {
        let url = normalize_base_url(url);
        self.sites.iter().find(|s| s.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{"sites":[{"url":"https://a.org/","name":"A"}]}"#).unwrap();
        let cfg = cfg.validated().unwrap();
        assert_eq!(cfg.sites[0].url, "https://a.org");
        assert_eq!(cfg.crawl.delay_ms, 150);
        assert!(cfg.site("https://a.org/").is_some());
        assert!(cfg.site("https://a.org/page").is_none());
    }

    #[test]
    fn rejects_duplicates() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{"sites":[{"url":"https://a.org","name":"A"},{"url":"https://a.org/","name":"B"}]}"#,
        )
        .unwrap();
        assert!(cfg.validated().is_err());
    }
}
