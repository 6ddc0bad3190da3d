use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use crawler::HttpFetcher;
use searchcore::config::{AppConfig, CrawlSettings, SiteConfig};
use searchcore::lemmatizer::Lemmatizer;
use searchcore::store::{SledStore, Store};
use searchcore::{NewPage, SiteStatus};
use serde_json::Value;
use server::{build_app, AppState};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn seed(store: &dyn Store, url: &str, name: &str, pages: &[(&str, &str, &str)]) {
    let site = store.insert_site(url, name, SiteStatus::Indexed).unwrap();
    let new_pages = pages
        .iter()
        .map(|(path, title, body)| NewPage {
            path: path.to_string(),
            code: 200,
            content: format!("<html><head><title>{title}</title></head><body><p>{body}</p></body></html>"),
        })
        .collect();
    let pages = store.insert_pages(site.id, new_pages).unwrap();
    let lemmatizer = Lemmatizer::english();
    let frequencies = indexer::builder::lemma_frequencies(&lemmatizer, &pages);
    let lemmas = store.insert_lemmas(site.id, frequencies.into_iter().collect()).unwrap();
    store.insert_occurrences(&indexer::builder::occurrences(&lemmatizer, &pages, &lemmas)).unwrap();
}

fn app() -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path().join("store")).unwrap();
    seed(
        &store,
        "https://pets.org",
        "Pets",
        &[("/cats", "Cats", "cats are great pets"), ("/dogs", "Dogs", "dogs are great pets too")],
    );
    let config = AppConfig {
        sites: vec![SiteConfig { url: "https://pets.org".into(), name: "Pets".into() }],
        crawl: CrawlSettings::default(),
    };
    let fetcher = Arc::new(HttpFetcher::new(&config.crawl).unwrap());
    (build_app(AppState::new(config, Arc::new(store), fetcher)), dir)
}

async fn call(method: Method, uri: &str) -> (StatusCode, Value) {
    let (app, _dir) = app();
    let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body: Bytes = http_body_util::BodyExt::collect(resp.into_body()).await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn search_returns_both_pages_with_snippets() {
    let (status, json) = call(Method::GET, "/api/search?query=great%20pets").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    for hit in data {
        assert_eq!(hit["site"], "https://pets.org");
        assert_eq!(hit["siteName"], "Pets");
        assert!(hit["snippet"].as_str().unwrap().contains("<b>great pets</b>"));
    }
    let uris: Vec<_> = data.iter().map(|h| h["uri"].as_str().unwrap()).collect();
    assert!(uris.contains(&"/cats") && uris.contains(&"/dogs"));
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let (status, json) = call(Method::GET, "/api/search?query=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn unknown_site_is_rejected() {
    let (_, json) = call(Method::GET, "/api/search?query=pets&site=https://nowhere.org").await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn offset_past_the_end_is_empty() {
    let (_, json) = call(Method::GET, "/api/search?query=pets&offset=10&limit=5").await;
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn stop_without_running_job_fails() {
    let (_, json) = call(Method::GET, "/api/stopIndexing").await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "indexing is not running");
}

#[tokio::test]
async fn index_page_rejects_unknown_url() {
    let (_, json) = call(Method::POST, "/api/indexPage?url=https://elsewhere.org").await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn statistics_reports_seeded_site() {
    let (status, json) = call(Method::GET, "/api/statistics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let total = &json["statistics"]["total"];
    assert_eq!(total["sites"], 1);
    assert_eq!(total["pages"], 2);
    assert_eq!(total["indexing"], false);
    assert_eq!(json["statistics"]["detailed"][0]["status"], "INDEXED");
}

#[tokio::test]
async fn health_is_ok() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (app, _dir) = app();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
