/*!
 * End-to-end tests: HTTP endpoints over the real source, client and cache
 */

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

use autotranslate::app_config::Config;
use autotranslate::app_controller::Controller;
use autotranslate::server;

use crate::common::{SAMPLE_SRT, init_test_logging, spawn_stub};

/// Upstream addon offering `SAMPLE_SRT` in English for every id
async fn upstream() -> String {
    let listing = |headers: axum::http::HeaderMap| async move {
        let host = headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({ "subtitles": [{ "id": "1", "lang": "en", "url": format!("http://{}/en.srt", host) }] }))
    };

    spawn_stub(
        Router::new()
            .route("/subtitles/{media_type}/{file}", get(listing))
            .route("/en.srt", get(|| async { SAMPLE_SRT })),
    )
    .await
}

/// Translation endpoint uppercasing its input and counting calls
async fn translator(calls: Arc<AtomicUsize>) -> String {
    let translate = |State(calls): State<Arc<AtomicUsize>>, Json(body): Json<Value>| async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Json(json!({ "translatedText": body["q"].as_str().unwrap_or_default().to_uppercase() }))
    };

    spawn_stub(Router::new().route("/translate", post(translate)).with_state(calls)).await
}

async fn app(upstream: &str, endpoint: &str) -> Router {
    init_test_logging();
    let mut config = Config::default();
    config.source.upstreams = vec![upstream.to_string()];
    config.translation.endpoint = endpoint.to_string();
    config.server.public_base_url = Some("https://addon.example".to_string());

    let controller = Controller::with_config(config).unwrap();
    server::router(Arc::new(controller))
}

async fn get_body(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_subtitles_withLiveStubs_shouldServeTranslatedFile() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(&upstream().await, &translator(calls.clone()).await).await;

    let (status, body) = get_body(&app, "/subtitles/movie/tt0111161/targetLang=es.json").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    let url = body["subtitles"][0]["url"].as_str().unwrap();
    assert_eq!(body["subtitles"][0]["lang"], "es");
    assert!(url.starts_with("https://addon.example/subs/"));

    let path = url.trim_start_matches("https://addon.example");
    let (status, srt) = get_body(&app, path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srt, SAMPLE_SRT.lines().map(|l| if l.contains("-->") { l.to_string() } else { l.to_uppercase() }).collect::<Vec<_>>().join("\n") + "\n");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subtitles_withRepeatedRequest_shouldUseCache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(&upstream().await, &translator(calls.clone()).await).await;

    let (_, first) = get_body(&app, "/subtitles/series/tt0903747:1:2.json?targetLang=fr").await;
    let (_, second) = get_body(&app, "/subtitles/series/tt0903747:1:2.json?targetLang=fr").await;

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subtitles_withEmptyUpstream_shouldReturnEmptyList() {
    let calls = Arc::new(AtomicUsize::new(0));
    let empty = spawn_stub(Router::new().route(
        "/subtitles/{media_type}/{file}",
        get(|| async { Json(json!({ "subtitles": [] })) }),
    ))
    .await;
    let app = app(&empty, &translator(calls.clone()).await).await;

    let (status, body) = get_body(&app, "/subtitles/movie/tt1.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "subtitles": [] }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subtitles_withUpstreamOverride_shouldReadFromIt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let empty = spawn_stub(Router::new().route(
        "/subtitles/{media_type}/{file}",
        get(|| async { Json(json!({ "subtitles": [] })) }),
    ))
    .await;
    let app = app(&empty, &translator(calls.clone()).await).await;

    let extra: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("targetLang", "de")
        .append_pair("upstreams", &upstream().await)
        .finish();
    let (_, body) = get_body(&app, &format!("/subtitles/movie/tt1/{}.json", extra)).await;

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["subtitles"].as_array().unwrap().len(), 1);
    assert_eq!(body["subtitles"][0]["id"], "tt1-de-autotranslate");
}

#[tokio::test]
async fn test_manifest_withPublicBaseUrl_shouldLinkConfigurePage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(&upstream().await, &translator(calls).await).await;

    let (status, body) = get_body(&app, "/manifest.json").await;
    let manifest: Value = serde_json::from_str(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["id"], server::ADDON_ID);
    assert_eq!(manifest["types"], json!(["movie", "series"]));
    assert_eq!(manifest["config"][0]["default"], "pt-BR");
    assert_eq!(manifest["behaviorHints"]["config_url"], "https://addon.example/configure");
}
