use crate::error::IndexingError;
use crate::orchestrator::SiteIndexer;
use anyhow::Result;
use crawler::{CrawlOptions, Crawler, Fetcher};
use parking_lot::Mutex;
use searchcore::config::{AppConfig, SiteConfig};
use searchcore::lemmatizer::Lemmatizer;
use searchcore::model::normalize_base_url;
use searchcore::store::Store;
use searchcore::SiteStatus;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { success: true, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()) }
    }
}

/// Launches and stops per-site indexing jobs.
///
/// Jobs share nothing but the store. The "already running" guard reads site
/// statuses and is not atomic with the launch that follows it.
///
/// One coordinator owns a store: active rows without a job of this
/// coordinator behind them are treated as left over from a dead process.
pub struct IndexingCoordinator {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    indexer: Arc<SiteIndexer>,
    pool: Arc<Semaphore>,
    cancel: Mutex<CancellationToken>,
    jobs: Mutex<Vec<JoinHandle<SiteStatus>>>,
    /// Sites whose job task has not returned yet.
    running: Arc<Mutex<HashSet<String>>>,
}

/// Keeps a site in the running set for as long as its task lives.
struct RunningGuard {
    running: Arc<Mutex<HashSet<String>>>,
    site: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.site);
    }
}

impl IndexingCoordinator {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>, lemmatizer: Arc<Lemmatizer>) -> Self {
        let options = CrawlOptions { delay: Duration::from_millis(config.crawl.delay_ms), ..Default::default() };
        let workers = options.workers;
        let crawler = Crawler::new(fetcher, options);
        let coordinator = Self {
            config: Arc::new(config),
            indexer: Arc::new(SiteIndexer::new(store.clone(), crawler, lemmatizer)),
            store,
            pool: Arc::new(Semaphore::new(workers)),
            cancel: Mutex::new(CancellationToken::new()),
            jobs: Mutex::new(Vec::new()),
            running: Arc::new(Mutex::new(HashSet::new())),
        };
        if let Err(err) = coordinator.fail_orphaned_sites() {
            tracing::error!(%err, "cannot recover interrupted sites");
        }
        coordinator
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True while any stored site is queued or crawling.
    pub fn is_indexing(&self) -> Result<bool> {
        Ok(self.store.list_sites()?.iter().any(|s| s.status.is_active()))
    }

    /// Drops every stored site.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()
    }

    /// Starts a job for every configured site unless a run is already in flight.
    pub fn index_all(&self) {
        match self.is_indexing() {
            Ok(true) => {
                tracing::info!("indexing already running");
                return;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(%err, "cannot read site statuses");
                return;
            }
        }
        for site in self.config.sites.clone() {
            if let Err(err) = self.launch(site.clone()) {
                tracing::error!(site = %site.url, %err, "cannot launch indexing");
            }
        }
    }

    /// [`Self::index_all`] with an explicit answer for the request layer.
    pub fn start_indexing_all(&self) -> ActionResponse {
        match self.is_indexing() {
            Ok(true) => ActionResponse::fail("indexing is already running"),
            Ok(false) => {
                self.index_all();
                ActionResponse::ok()
            }
            Err(err) => ActionResponse::fail(format!("storage failure: {err}")),
        }
    }

    /// Re-indexes a site that is already in the store.
    pub fn index_site(&self, url: &str) -> ActionResponse {
        let url = normalize_base_url(url);
        if url.is_empty() {
            return ActionResponse::fail("site url is empty");
        }
        let existing = match self.store.find_site_by_url(&url) {
            Ok(Some(site)) => site,
            Ok(None) => return ActionResponse::fail("site is not in the index"),
            Err(err) => return ActionResponse::fail(format!("storage failure: {err}")),
        };
        if existing.status.is_active() {
            return ActionResponse::fail("site is already being indexed");
        }
        let name = self.config.site(&url).map(|s| s.name.clone()).unwrap_or(existing.name);
        if let Err(err) = self.store.delete_site_cascade(existing.id) {
            return ActionResponse::fail(format!("storage failure: {err}"));
        }
        self.respond(self.launch(SiteConfig { url, name }))
    }

    /// Indexes `url` when it is exactly the base URL of a configured site.
    pub fn index_page(&self, url: &str) -> ActionResponse {
        if url.trim().is_empty() {
            return ActionResponse::fail("page url is empty");
        }
        let Some(site) = self.config.site(url).cloned() else {
            return ActionResponse::fail("page is outside the configured sites");
        };
        match self.store.find_site_by_url(&site.url) {
            Ok(Some(existing)) if existing.status.is_active() => {
                return ActionResponse::fail("site is already being indexed");
            }
            Err(err) => return ActionResponse::fail(format!("storage failure: {err}")),
            _ => {}
        }
        self.respond(self.launch(site))
    }

    /// Asks every in-flight job to stop at its next phase boundary.
    pub fn stop_indexing(&self) -> ActionResponse {
        match self.is_indexing() {
            Ok(true) => {}
            Ok(false) => return ActionResponse::fail("indexing is not running"),
            Err(err) => return ActionResponse::fail(format!("storage failure: {err}")),
        }
        let token = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        token.cancel();
        tracing::info!("indexing stop requested");
        if let Err(err) = self.fail_orphaned_sites() {
            return ActionResponse::fail(format!("storage failure: {err}"));
        }
        ActionResponse::ok()
    }

    /// Moves queued or crawling sites with no live job of this coordinator to FAILED.
    ///
    /// Returns how many sites were moved.
    pub fn fail_orphaned_sites(&self) -> Result<usize> {
        let live = self.running.lock().clone();
        let mut moved = 0;
        for mut site in self.store.list_sites()? {
            if !site.status.is_active() || live.contains(&site.url) {
                continue;
            }
            tracing::warn!(site = %site.url, status = ?site.status, "no job behind active site, marking failed");
            site.transition(SiteStatus::Failed, Some(IndexingError::Stopped.to_string()));
            self.store.update_site(&site)?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Waits for every job launched so far.
    pub async fn wait_all(&self) -> Vec<SiteStatus> {
        let jobs = std::mem::take(&mut *self.jobs.lock());
        let mut statuses = Vec::with_capacity(jobs.len());
        for job in jobs {
            match job.await {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    tracing::error!(%err, "indexing job aborted");
                    statuses.push(SiteStatus::Failed);
                }
            }
        }
        statuses
    }

    fn respond(&self, launched: Result<()>) -> ActionResponse {
        match launched {
            Ok(()) => ActionResponse::ok(),
            Err(err) => ActionResponse::fail(format!("storage failure: {err}")),
        }
    }

    fn launch(&self, site: SiteConfig) -> Result<()> {
        self.store.insert_site(&site.url, &site.name, SiteStatus::Queued)?;
        let token = self.cancel.lock().clone();
        let pool = self.pool.clone();
        let indexer = self.indexer.clone();
        tracing::debug!(site = %site.url, "indexing queued");
        self.running.lock().insert(site.url.clone());
        let guard = RunningGuard { running: self.running.clone(), site: site.url.clone() };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            // the pool is never closed
            let _permit = pool.acquire_owned().await.ok();
            indexer.run(site, token).await
        });
        let mut jobs = self.jobs.lock();
        jobs.retain(|job| !job.is_finished());
        jobs.push(handle);
        Ok(())
    }
}
