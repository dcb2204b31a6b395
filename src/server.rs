/*!
 * HTTP surface of the subtitle addon.
 *
 * Routes:
 * - `GET /health`
 * - `GET /manifest.json`
 * - `GET /configure`
 * - `GET /subtitles/{type}/{id}.json` and `/subtitles/{type}/{id}/{extra}.json`
 * - `GET /subs/{fingerprint}.srt`
 *
 * Handlers are thin: they resolve request options and delegate to the
 * controller, which never fails a request.
 */

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::app_config::{parse_upstreams, Config};
use crate::app_controller::{Controller, SubtitleRequest};
use crate::language_utils::{self, SUPPORTED_TARGET_LANGUAGES};
use crate::translation::cache::is_valid_fingerprint;

/// Manifest identifier
pub const ADDON_ID: &str = "org.autotranslate.subtitles";

/// Shared state accessible from handlers
#[derive(Clone)]
pub struct AppState {
    /// Request orchestration
    pub controller: Arc<Controller>,
    /// When the server started
    pub start_time: Instant,
}

/// Options a client can pass in the `extra` segment or the query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Target language tag
    pub target_language: Option<String>,
    /// Comma separated upstream base URLs
    pub upstreams: Option<String>,
}

impl RequestOptions {
    /// Read options from a key/value map
    ///
    /// `targetLang` wins over `lang`; blank values count as missing.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut target_lang = None;
        let mut lang = None;
        let mut upstreams = None;

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "targetLang" => target_lang = Some(value.to_string()),
                "lang" => lang = Some(value.to_string()),
                "upstreams" => upstreams = Some(value.to_string()),
                _ => {},
            }
        }

        Self { target_language: target_lang.or(lang), upstreams }
    }

    /// Parse the `extra` path segment: a JSON object or a URL-encoded form
    pub fn from_extra(extra: &str) -> Self {
        let extra = extra.trim();

        if extra.starts_with('{') {
            return match serde_json::from_str::<HashMap<String, Value>>(extra) {
                Ok(map) => Self::from_pairs(
                    map.iter().filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v))),
                ),
                Err(e) => {
                    debug!("Ignoring malformed extra {:?}: {}", extra, e);
                    Self::default()
                },
            };
        }

        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(extra.as_bytes())
            .into_owned()
            .collect();
        Self::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Read options from query parameters
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self::from_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Build the request from path parts and options
///
/// Precedence is `extra`, then the query string, then configuration. Fails
/// when the chosen target language is not a valid tag.
pub fn resolve_request(
    config: &Config,
    media_type: &str,
    media_id: &str,
    extra: &RequestOptions,
    query: &RequestOptions,
) -> Result<SubtitleRequest> {
    let target = extra
        .target_language
        .as_deref()
        .or(query.target_language.as_deref())
        .unwrap_or(&config.server.default_target_language);
    let target_language = language_utils::normalize_language_tag(target)?;

    let upstreams = [extra.upstreams.as_deref(), query.upstreams.as_deref()]
        .into_iter()
        .flatten()
        .map(parse_upstreams)
        .find(|list| !list.is_empty())
        .unwrap_or_else(|| config.source.upstreams.clone());

    Ok(SubtitleRequest {
        media_type: media_type.to_string(),
        media_id: media_id.to_string(),
        target_language,
        upstreams,
    })
}

/// Build the router with all routes
pub fn router(controller: Arc<Controller>) -> Router {
    let state = AppState { controller, start_time: Instant::now() };

    Router::new()
        .route("/health", get(health_handler))
        .route("/manifest.json", get(manifest_handler))
        .route("/configure", get(configure_handler))
        .route("/subtitles/{media_type}/{id}", get(subtitles_handler))
        .route("/subtitles/{media_type}/{id}/{extra}", get(subtitles_with_extra_handler))
        .route("/subs/{file}", get(subtitle_file_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(controller: Arc<Controller>) -> Result<()> {
    let address = format!("{}:{}", controller.config().server.host, controller.config().server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening on http://{}", listener.local_addr()?);
    info!("Configuration page: {}/configure",
          controller.config().server.public_base_url.clone().unwrap_or_else(|| format!("http://{}", address)));

    axum::serve(listener, router(controller))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

/// Base URL for links: configured value, else scheme and host of the request
pub fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = config.server.public_base_url.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        return base.trim_end_matches('/').to_string();
    }

    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let scheme = header_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header_value("x-forwarded-host")
        .or_else(|| header_value(header::HOST.as_str()))
        .unwrap_or_else(|| format!("localhost:{}", config.server.port));

    format!("{}://{}", scheme, host)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let (hits, computations) = state.controller.cache().stats();
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "cache": { "hits": hits, "computations": computations },
    }))
}

/// GET /manifest.json
async fn manifest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let config = state.controller.config();
    let base = base_url(config, &headers);
    let options = RequestOptions::from_query(&query);
    let target = options
        .target_language
        .and_then(|t| language_utils::normalize_language_tag(&t).ok())
        .filter(|t| language_utils::is_supported_target(t))
        .unwrap_or_else(|| config.server.default_target_language.clone());

    let language_options: Vec<Value> = SUPPORTED_TARGET_LANGUAGES
        .iter()
        .map(|(tag, name)| json!({ "name": format!("{} - {}", name, tag), "value": tag }))
        .collect();

    Json(json!({
        "id": ADDON_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "name": "Auto Translate",
        "description": "Reads subtitles from Stremio subtitle addons, prefers English, translates them and serves SRT in the chosen language.",
        "resources": ["subtitles"],
        "types": ["movie", "series"],
        "idPrefixes": ["tt"],
        "catalogs": [],
        "config": [
            {
                "key": "targetLang",
                "name": "Target subtitle language",
                "type": "select",
                "options": language_options,
                "default": target,
            },
            {
                "key": "upstreams",
                "name": "Subtitle addon base URLs (comma separated)",
                "type": "text",
                "default": options.upstreams.unwrap_or_default(),
            },
        ],
        "behaviorHints": {
            "configurable": true,
            "configurationRequired": false,
            "config_url": format!("{}/configure", base),
        },
    }))
}

/// GET /configure
async fn configure_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    let config = state.controller.config();
    let base = base_url(config, &headers);
    let options = RequestOptions::from_query(&query);
    let target = options.target_language.unwrap_or_else(|| config.server.default_target_language.clone());
    let upstreams = options.upstreams.unwrap_or_default();

    let install_url = format!(
        "{}/manifest.json?{}",
        base,
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("targetLang", &target)
            .append_pair("upstreams", &upstreams)
            .finish()
    );

    let options_html: String = SUPPORTED_TARGET_LANGUAGES
        .iter()
        .map(|(tag, name)| {
            let selected = if tag.eq_ignore_ascii_case(&target) { " selected" } else { "" };
            format!("<option value=\"{}\"{}>{} - {}</option>", tag, selected, name, tag)
        })
        .collect();

    Html(format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Auto Translate - Configure</title></head>
<body style="font-family: system-ui, sans-serif; padding: 24px; max-width: 880px;">
<h2>Auto Translate</h2>
<form method="GET" action="/configure">
<label>Target language: <select name="targetLang">{options}</select></label><br/><br/>
<label>Subtitle addon base URLs, comma separated:<br/>
<input style="width:100%" type="text" name="upstreams" value="{upstreams}"/></label><br/><br/>
<button type="submit">Generate install link</button>
</form>
<p>Install in Stremio with this manifest:</p>
<pre>{install}</pre>
<p><a href="{install}">Open manifest.json</a></p>
</body></html>
"#,
        options = options_html,
        upstreams = escape_html(&upstreams),
        install = escape_html(&install_url),
    ))
}

/// GET /subtitles/{type}/{id}.json
async fn subtitles_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((media_type, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(id) = id.strip_suffix(".json") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    subtitles_response(&state, &headers, &media_type, id, RequestOptions::default(), &query).await
}

/// GET /subtitles/{type}/{id}/{extra}.json
async fn subtitles_with_extra_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((media_type, id, extra)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(extra) = extra.strip_suffix(".json") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let extra = RequestOptions::from_extra(extra);
    subtitles_response(&state, &headers, &media_type, &id, extra, &query).await
}

async fn subtitles_response(
    state: &AppState,
    headers: &HeaderMap,
    media_type: &str,
    id: &str,
    extra: RequestOptions,
    query: &HashMap<String, String>,
) -> Response {
    let controller = &state.controller;
    let query = RequestOptions::from_query(query);

    let subtitles = match resolve_request(controller.config(), media_type, id, &extra, &query) {
        Ok(request) => controller.subtitles_for(&request, &base_url(controller.config(), headers)).await,
        Err(e) => {
            warn!("Rejected subtitle request for {}/{}: {}", media_type, id, e);
            Vec::new()
        },
    };

    Json(json!({ "subtitles": subtitles })).into_response()
}

/// GET /subs/{fingerprint}.srt
async fn subtitle_file_handler(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let Some(fingerprint) = file.strip_suffix(".srt").filter(|f| is_valid_fingerprint(f)) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.controller.cached_subtitle(fingerprint).await {
        Some(entry) => (
            [(header::CONTENT_TYPE, "application/x-subrip; charset=utf-8")],
            entry.document.clone(),
        ).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
