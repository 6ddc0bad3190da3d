use crate::snippet::build_snippet;
use searchcore::html::title_and_body;
use searchcore::lemmatizer::Lemmatizer;
use searchcore::model::normalize_base_url;
use searchcore::store::Store;
use searchcore::{Lemma, Occurrence, Page, PageId, Site, SiteId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("site {0} is not indexed")]
    UnknownSite(String),
    #[error("query word {0:?} is not indexed on any site")]
    UnmatchedLemma(String),
    #[error("storage failure: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub site: String,
    pub site_name: String,
    pub uri: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    fn found(data: Vec<SearchHit>) -> Self {
        Self { success: true, count: data.len(), data, error: None }
    }

    fn failed(err: &SearchError) -> Self {
        Self { success: false, count: 0, data: Vec::new(), error: Some(err.to_string()) }
    }
}

/// Read-only ranked lookup over the lemma index.
pub struct SearchEngine {
    store: Arc<dyn Store>,
    lemmatizer: Arc<Lemmatizer>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn Store>, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self { store, lemmatizer }
    }

    /// Ranked pages for `query`, restricted to `site` when one is given.
    ///
    /// Failures come back as `success: false` responses, never as errors.
    pub fn search(&self, query: &str, site: Option<&str>, offset: usize, limit: usize) -> SearchResponse {
        match self.run(query, site, offset, limit) {
            Ok(hits) => SearchResponse::found(hits),
            Err(err) => {
                tracing::debug!(query, %err, "search rejected");
                SearchResponse::failed(&err)
            }
        }
    }

    fn run(&self, query: &str, site: Option<&str>, offset: usize, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let site = site.map(normalize_base_url).filter(|s| !s.is_empty());
        let scope: Vec<Site> = match &site {
            Some(url) => {
                let found = self.store.find_site_by_url(url)?;
                vec![found.ok_or_else(|| SearchError::UnknownSite(url.clone()))?]
            }
            None => self.store.list_sites()?,
        };

        let query_lemmas = self.lemmatizer.query_lemmas(query);
        let mut lemmas: Vec<Lemma> = Vec::new();
        for s in &scope {
            lemmas.extend(self.store.find_lemmas_by_site_matching_forms(s.id, &query_lemmas)?);
        }
        if site.is_none() {
            let resolved: HashSet<&str> = lemmas.iter().map(|l| l.form.as_str()).collect();
            if let Some(missing) = query_lemmas.iter().find(|q| !resolved.contains(q.as_str())) {
                return Err(SearchError::UnmatchedLemma(missing.clone()));
            }
        }
        // rarest first
        lemmas.sort_by_key(|l| l.frequency);
        if lemmas.len() < query_lemmas.len() {
            return Ok(Vec::new());
        }

        let lemma_ids: Vec<u64> = lemmas.iter().map(|l| l.id).collect();
        let pages = self.store.find_pages_by_lemma_set(&lemma_ids)?;
        let page_ids: Vec<PageId> = pages.iter().map(|p| p.id).collect();
        let occurrences = self.store.find_occurrences_by_pages_and_lemmas(&page_ids, &lemma_ids)?;
        let ranked = rank_pages(&pages, &occurrences);
        if offset >= ranked.len() {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(limit).min(ranked.len());

        let sites: HashMap<SiteId, &Site> = scope.iter().map(|s| (s.id, s)).collect();
        let mut hits = Vec::with_capacity(end - offset);
        for &(page, relevance) in &ranked[offset..end] {
            let Some(owner) = sites.get(&page.site_id) else {
                continue;
            };
            let (title, body) = title_and_body(&page.content);
            let snippet = build_snippet(&self.lemmatizer, &format!("{title} {body}"), &query_lemmas);
            if snippet.is_empty() {
                continue;
            }
            hits.push(SearchHit {
                site: owner.url.clone(),
                site_name: owner.name.clone(),
                uri: page.path.clone(),
                title,
                snippet,
                relevance,
            });
        }
        Ok(hits)
    }
}

/// Pages by descending relevance, normalised so the best page scores 1.0.
pub fn rank_pages<'a>(pages: &'a [Page], occurrences: &[Occurrence]) -> Vec<(&'a Page, f32)> {
    let mut totals: HashMap<PageId, f32> = HashMap::new();
    for o in occurrences {
        *totals.entry(o.page_id).or_insert(0.0) += o.rank;
    }
    let max = totals.values().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let mut ranked: Vec<(&Page, f32)> = pages
        .iter()
        .filter_map(|p| totals.get(&p.id).map(|&total| (p, total / max)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.id.cmp(&b.0.id)));
    ranked
}
