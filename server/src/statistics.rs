use anyhow::Result;
use searchcore::store::Store;
use searchcore::SiteStatus;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub success: bool,
    pub statistics: Statistics,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}

#[derive(Debug, Serialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: usize,
    pub lemmas: usize,
    pub indexing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub status_time: OffsetDateTime,
    pub last_error: Option<String>,
    pub page_count: usize,
    pub lemma_count: usize,
}

pub fn statistics(store: &dyn Store) -> Result<StatisticsResponse> {
    let mut detailed = Vec::new();
    for site in store.list_sites()? {
        detailed.push(SiteStatistics {
            page_count: store.count_pages(site.id)?,
            lemma_count: store.count_lemmas(site.id)?,
            url: site.url,
            name: site.name,
            status: site.status,
            status_time: site.status_time,
            last_error: site.last_error,
        });
    }
    let total = TotalStatistics {
        sites: detailed.len(),
        pages: detailed.iter().map(|s| s.page_count).sum(),
        lemmas: detailed.iter().map(|s| s.lemma_count).sum(),
        indexing: detailed.iter().any(|s| s.status.is_active()),
    };
    Ok(StatisticsResponse { success: true, statistics: Statistics { total, detailed } })
}
