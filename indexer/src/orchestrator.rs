use crate::builder;
use crate::error::IndexingError;
use crawler::Crawler;
use searchcore::config::SiteConfig;
use searchcore::lemmatizer::Lemmatizer;
use searchcore::model::relative_path;
use searchcore::store::Store;
use searchcore::{NewPage, Site, SiteStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one site through crawl, page, lemma and occurrence phases.
///
/// Cancellation is observed only between phases; a running crawl or scan
/// always completes first.
pub struct SiteIndexer {
    store: Arc<dyn Store>,
    crawler: Crawler,
    lemmatizer: Arc<Lemmatizer>,
}

impl SiteIndexer {
    pub fn new(store: Arc<dyn Store>, crawler: Crawler, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self { store, crawler, lemmatizer }
    }

    /// Indexes `site` from scratch and returns the terminal status.
    pub async fn run(&self, site: SiteConfig, cancel: CancellationToken) -> SiteStatus {
        if cancel.is_cancelled() {
            return self.fail_before_start(&site, IndexingError::Stopped);
        }
        let mut record = match self.store.insert_site(&site.url, &site.name, SiteStatus::Crawling) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(site = %site.url, %err, "cannot create site record");
                return SiteStatus::Failed;
            }
        };
        tracing::info!(site = %record.url, "indexing started");

        match self.index(&mut record, &cancel).await {
            Ok(()) => {
                record.transition(SiteStatus::Indexed, None);
                tracing::info!(site = %record.url, "site indexed");
            }
            Err(err) => {
                tracing::warn!(site = %record.url, %err, "indexing failed");
                record.transition(SiteStatus::Failed, Some(err.to_string()));
            }
        }
        if let Err(err) = self.store.update_site(&record) {
            tracing::error!(site = %record.url, %err, "cannot record final status");
        }
        record.status
    }

    fn fail_before_start(&self, site: &SiteConfig, err: IndexingError) -> SiteStatus {
        let result = self.store.insert_site(&site.url, &site.name, SiteStatus::Failed).and_then(|mut record| {
            record.transition(SiteStatus::Failed, Some(err.to_string()));
            self.store.update_site(&record)
        });
        if let Err(err) = result {
            tracing::error!(site = %site.url, %err, "cannot record final status");
        }
        SiteStatus::Failed
    }

    async fn index(&self, site: &mut Site, cancel: &CancellationToken) -> Result<(), IndexingError> {
        let seed = format!("{}/", site.url);
        let crawled = self.crawler.crawl(&seed).await;
        checkpoint(cancel, IndexingError::Stopped)?;

        let new_pages: Vec<NewPage> = crawled
            .into_iter()
            .filter_map(|p| {
                relative_path(&site.url, &p.url).map(|path| NewPage { path, code: p.status, content: p.html })
            })
            .collect();
        let pages = self.store.insert_pages(site.id, new_pages)?;
        tracing::info!(site = %site.url, pages = pages.len(), "pages saved");
        checkpoint(cancel, IndexingError::Stopped)?;

        let lemmatizer = self.lemmatizer.clone();
        let (pages, frequencies) = tokio::task::spawn_blocking(move || {
            let frequencies = builder::lemma_frequencies(&lemmatizer, &pages);
            (pages, frequencies)
        })
        .await?;
        site.touch();
        self.store.update_site(site)?;
        let lemmas = self.store.insert_lemmas(site.id, frequencies.into_iter().collect())?;
        tracing::info!(site = %site.url, lemmas = lemmas.len(), "lemmas saved");
        checkpoint(cancel, IndexingError::NoLemmas)?;

        let lemmatizer = self.lemmatizer.clone();
        let occurrences =
            tokio::task::spawn_blocking(move || builder::occurrences(&lemmatizer, &pages, &lemmas)).await?;
        self.store.insert_occurrences(&occurrences)?;
        tracing::info!(site = %site.url, occurrences = occurrences.len(), "occurrences saved");
        Ok(())
    }
}

fn checkpoint(cancel: &CancellationToken, err: IndexingError) -> Result<(), IndexingError> {
    if cancel.is_cancelled() {
        return Err(err);
    }
    Ok(())
}
