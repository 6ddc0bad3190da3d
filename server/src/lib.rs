pub mod search;
pub mod snippet;
pub mod statistics;

use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderValue, StatusCode}, routing::{get, post}, Json, Router};
use crawler::Fetcher;
use indexer::{ActionResponse, IndexingCoordinator};
use search::{SearchEngine, SearchResponse, DEFAULT_LIMIT};
use searchcore::config::AppConfig;
use searchcore::lemmatizer::Lemmatizer;
use searchcore::store::Store;
use serde::Deserialize;
use statistics::StatisticsResponse;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<SearchEngine>,
    pub coordinator: Arc<IndexingCoordinator>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>) -> Self {
        let lemmatizer = Arc::new(Lemmatizer::english());
        Self {
            engine: Arc::new(SearchEngine::new(store.clone(), lemmatizer.clone())),
            coordinator: Arc::new(IndexingCoordinator::new(config, store.clone(), fetcher, lemmatizer)),
            store,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { DEFAULT_LIMIT }

#[derive(Deserialize)]
pub struct SiteParams {
    #[serde(default)]
    pub site: String,
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub url: String,
}

/// CORS policy for a comma-separated origin list; any origin when unset or unparseable.
pub fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/statistics", get(statistics_handler))
        .route("/api/startIndexing", get(start_indexing))
        .route("/api/stopIndexing", get(stop_indexing))
        .route("/api/indexPage", post(index_page))
        .route("/api/search", get(search_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Clears the store and indexes every configured site.
pub fn reindex_from_scratch(state: &AppState) -> Result<()> {
    state.coordinator.reset()?;
    state.coordinator.index_all();
    Ok(())
}

pub async fn statistics_handler(State(state): State<AppState>) -> Result<Json<StatisticsResponse>, (StatusCode, String)> {
    statistics::statistics(state.store.as_ref())
        .map(Json)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

/// Without `site` every configured site is indexed.
pub async fn start_indexing(State(state): State<AppState>, Query(params): Query<SiteParams>) -> Json<ActionResponse> {
    if params.site.trim().is_empty() {
        return Json(state.coordinator.start_indexing_all());
    }
    Json(state.coordinator.index_site(&params.site))
}

pub async fn stop_indexing(State(state): State<AppState>) -> Json<ActionResponse> {
    Json(state.coordinator.stop_indexing())
}

pub async fn index_page(State(state): State<AppState>, Query(params): Query<PageParams>) -> Json<ActionResponse> {
    Json(state.coordinator.index_page(&params.url))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let site = Some(params.site.as_str()).filter(|s| !s.trim().is_empty());
    let resp = state.engine.search(&params.query, site, params.offset, params.limit);
    tracing::debug!(query = %params.query, hits = resp.count, took_s = start.elapsed().as_secs_f64(), "search");
    Json(resp)
}
