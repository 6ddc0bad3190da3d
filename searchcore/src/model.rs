use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type SiteId = u64;
pub type PageId = u64;
pub type LemmaId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteStatus {
    Queued,
    Crawling,
    Indexed,
    Failed,
}

impl SiteStatus {
    /// True while a job for the site has been launched but not finished.
    pub fn is_active(self) -> bool {
        matches!(self, SiteStatus::Queued | SiteStatus::Crawling)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub status_time: OffsetDateTime,
    pub last_error: Option<String>,
}

impl Site {
    /// Moves the site to `status` and stamps the transition time.
    pub fn transition(&mut self, status: SiteStatus, error: Option<String>) {
        self.status = status;
        self.status_time = OffsetDateTime::now_utc();
        self.last_error = error;
    }

    pub fn touch(&mut self) {
        self.status_time = OffsetDateTime::now_utc();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub site_id: SiteId,
    /// Suffix of the absolute URL after the site's base URL, e.g. "/about".
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// Page data before the store assigns it an id.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub path: String,
    pub code: u16,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lemma {
    pub id: LemmaId,
    pub site_id: SiteId,
    pub form: String,
    /// Number of distinct pages of the site whose title or body holds the form.
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub page_id: PageId,
    pub lemma_id: LemmaId,
    pub rank: f32,
}

/// Strips the trailing slash so base URLs compare exactly.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Path of `absolute` relative to `base`, or `None` when it lies outside the site.
pub fn relative_path(base: &str, absolute: &str) -> Option<String> {
    let rest = absolute.strip_prefix(base)?;
    if rest.is_empty() {
        return Some("/".to_string());
    }
    Some(rest.to_string())
}
