/*!
 * Integration tests for the Stremio addon source against local stubs
 */

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;

use autotranslate::errors::SourceError;
use autotranslate::subtitle_source::{StremioAddonSource, SubtitleSource, fetch_preferred_subtitle};

use crate::common::{SAMPLE_SRT, spawn_stub};

fn source() -> StremioAddonSource {
    StremioAddonSource::new("autotranslate-tests", Duration::from_secs(5), Duration::from_secs(5))
}

fn host_base(headers: &HeaderMap) -> String {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("127.0.0.1");
    format!("http://{}", host)
}

/// Addon listing a French and an English subtitle for any id
async fn listing(headers: HeaderMap, Path((media_type, file)): Path<(String, String)>) -> Json<Value> {
    let base = host_base(&headers);
    let id = file.trim_end_matches(".json");
    Json(json!({
        "subtitles": [
            { "id": format!("{}-{}-fr", media_type, id), "lang": "fre", "url": format!("{}/files/fr.srt", base) },
            { "id": format!("{}-{}-en", media_type, id), "lang": "eng", "url": format!("{}/files/en.srt", base) },
        ]
    }))
}

fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn addon() -> Router {
    Router::new()
        .route("/subtitles/{media_type}/{file}", get(listing))
        .route("/files/en.srt", get(|| async { SAMPLE_SRT }))
        .route("/files/fr.srt", get(|| async { "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n" }))
        .route("/files/en.srt.gz", get(|| async { gzip(SAMPLE_SRT) }))
        .route("/files/long.srt.gz", get(|| async { gzip(&SAMPLE_SRT.repeat(100)) }))
        .route("/files/latin1.srt", get(|| async { b"1\n00:00:01,000 --> 00:00:02,000\nCaf\xe9\n".to_vec() }))
}

#[tokio::test]
async fn test_fetch_preferred_withEnglishListedSecond_shouldDownloadEnglish() {
    let base = spawn_stub(addon()).await;

    let text = fetch_preferred_subtitle(&source(), "movie", "tt0111161", &[base]).await.unwrap();

    assert_eq!(text, SAMPLE_SRT);
}

#[tokio::test]
async fn test_list_candidates_withFailingUpstream_shouldKeepHealthyOnes() {
    let healthy = spawn_stub(addon()).await;
    let broken = spawn_stub(Router::new().route(
        "/subtitles/{media_type}/{file}",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
    ))
    .await;

    let candidates = source()
        .list_candidates("series", "tt0903747:1:2", &[broken, healthy])
        .await;

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id, "series-tt0903747:1:2-fr");
    assert_eq!(candidates[1].lang, "eng");
}

#[tokio::test]
async fn test_list_candidates_withMalformedListing_shouldReturnNothing() {
    let base = spawn_stub(Router::new().route(
        "/subtitles/{media_type}/{file}",
        get(|| async { "not json" }),
    ))
    .await;

    assert!(source().list_candidates("movie", "tt1", &[base]).await.is_empty());
}

#[tokio::test]
async fn test_fetch_preferred_withNoCandidates_shouldBeNotFound() {
    let base = spawn_stub(Router::new().route(
        "/subtitles/{media_type}/{file}",
        get(|| async { Json(json!({ "subtitles": [] })) }),
    ))
    .await;

    let err = fetch_preferred_subtitle(&source(), "movie", "tt1", &[base]).await.unwrap_err();

    assert!(matches!(err, SourceError::NotFound(_)));
}

#[tokio::test]
async fn test_download_withGzipPayload_shouldInflate() {
    let base = spawn_stub(addon()).await;

    let text = source().download(&format!("{}/files/en.srt.gz", base)).await.unwrap();

    assert_eq!(text, SAMPLE_SRT);
}

#[tokio::test]
async fn test_download_withLatin1Payload_shouldDecode() {
    let base = spawn_stub(addon()).await;

    let text = source().download(&format!("{}/files/latin1.srt", base)).await.unwrap();

    assert!(text.contains("Café"));
}

#[tokio::test]
async fn test_download_withMissingFile_shouldFail() {
    let base = spawn_stub(addon()).await;

    let err = source().download(&format!("{}/files/missing.srt", base)).await.unwrap_err();

    assert!(matches!(err, SourceError::DownloadFailed { .. }));
}

#[tokio::test]
async fn test_download_withSlowUpstream_shouldTimeOut() {
    let base = spawn_stub(Router::new().route(
        "/slow.srt",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            SAMPLE_SRT.into_response()
        }),
    ))
    .await;
    let impatient = StremioAddonSource::new("autotranslate-tests", Duration::from_millis(100), Duration::from_millis(100));

    let err = impatient.download(&format!("{}/slow.srt", base)).await.unwrap_err();

    assert!(matches!(err, SourceError::DownloadFailed { .. }));
}

#[tokio::test]
async fn test_download_withOversizedPayload_shouldFail() {
    let base = spawn_stub(addon()).await;
    let strict = source().with_max_payload_bytes(16);

    let err = strict.download(&format!("{}/files/en.srt", base)).await.unwrap_err();

    assert!(matches!(err, SourceError::DownloadFailed { .. }));
}

#[tokio::test]
async fn test_download_withGzipInflatingPastLimit_shouldFail() {
    let base = spawn_stub(addon()).await;
    // The compressed body fits, the inflated text does not
    let limit = gzip(&SAMPLE_SRT.repeat(100)).len() + 1;
    assert!(limit < SAMPLE_SRT.len() * 100);
    let strict = source().with_max_payload_bytes(limit);

    let err = strict.download(&format!("{}/files/long.srt.gz", base)).await.unwrap_err();

    assert!(matches!(err, SourceError::Decode(_)));
}
