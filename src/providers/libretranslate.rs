use std::time::Duration;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use reqwest::{Client, StatusCode};
use log::{debug, error};

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Client for a LibreTranslate-compatible `/translate` endpoint
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    /// HTTP client for API requests
    client: Client,
    /// Base URL of the service, without trailing slash
    endpoint: String,
    /// Optional API key
    api_key: Option<String>,
    /// Request timeout, reported in timeout errors
    timeout: Duration,
}

/// Translation request body
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TranslateRequest {
    /// Text to translate
    pub q: String,
    /// Source language, always auto-detected
    pub source: String,
    /// Target language code
    pub target: String,
    /// Payload format
    pub format: String,
    /// API key if the instance requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl TranslateRequest {
    /// Create a plain-text request with automatic source detection
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            q: text.into(),
            source: "auto".to_string(),
            target: target_language.into(),
            format: "text".to_string(),
            api_key: None,
        }
    }

    /// Attach an API key
    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

impl LibreTranslate {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();

        Self {
            client: Client::builder()
                .timeout(timeout)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        }
    }

    /// Base URL of the endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_connect() {
            ProviderError::ConnectionError(e.to_string())
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }
}

#[async_trait]
impl Provider for LibreTranslate {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let url = format!("{}/translate", self.endpoint);
        let request = TranslateRequest::new(text, target_language).api_key(self.api_key.clone());

        let response = self.client.post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| self.map_send_error(e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded(truncate_text(&body, 200)));
        }

        if !status.is_success() {
            error!("Translation endpoint error ({}): {}", status, truncate_text(&body, 200));
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: truncate_text(&body, 200),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, truncate_text(&body, 200))))?;

        normalize_translation_response(&value)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/languages", self.endpoint);
        let response = self.client.get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status().is_success() {
            debug!("Translation endpoint {} is reachable", self.endpoint);
            Ok(())
        } else {
            Err(ProviderError::ApiError {
                status_code: response.status().as_u16(),
                message: "languages endpoint unavailable".to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        "libretranslate"
    }
}

/// Map every known response shape to the translated text
///
/// Recognized shapes:
/// - `{"translatedText": "..."}` (LibreTranslate)
/// - `{"translated_text": "..."}`, `{"translation": "..."}`, `{"text": "..."}`
/// - `{"responseStatus": 200, "responseData": {"translatedText": "..."}}` (MyMemory)
/// - `{"data": {"translations": [{"translatedText": "..."}]}}` (Google v2)
///
/// Anything else, including an explicit `error` field, is a `ParseError`.
pub fn normalize_translation_response(value: &Value) -> Result<String, ProviderError> {
    if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
        return Err(ProviderError::ParseError(format!("endpoint reported error: {}", message)));
    }

    if let Some(status) = value.get("responseStatus").and_then(|v| v.as_u64()) {
        if status == 429 {
            return Err(ProviderError::RateLimitExceeded("responseStatus 429".to_string()));
        }
        if status != 200 {
            return Err(ProviderError::ApiError {
                status_code: status as u16,
                message: value.get("responseDetails").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            });
        }
    }

    let candidates = [
        value.get("translatedText"),
        value.get("translated_text"),
        value.get("translation"),
        value.get("text"),
        value.pointer("/responseData/translatedText"),
        value.pointer("/data/translations/0/translatedText"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::ParseError(format!("unrecognized response shape: {}", truncate_text(&value.to_string(), 200))))
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
