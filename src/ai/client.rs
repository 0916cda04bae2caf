//! Retrying Gemini client.
//!
//! Wraps a single `generateContent` call with bounded, rate-limit-aware
//! retry. Rate-limit failures honor the server's suggested delay and are
//! retried sequentially; everything else surfaces immediately. The call
//! never panics and never leaks a transport error past `AiError`.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::error::AiError;
use crate::ai::parse;
use crate::config::Config;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Backoff used when the server gives no retry hint.
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Default retry bound: 4 total attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Seam for the generation backend so handlers and tests can swap
/// implementations.
#[async_trait]
pub trait TextGenerator {
    /// Generates content for `prompt`, retrying rate-limit failures up to
    /// `max_retries` times. The result is the model's reply normalized by
    /// [`parse::extract_json`]: parsed JSON when possible, otherwise the
    /// raw text as a JSON string.
    async fn generate(&self, prompt: &str, max_retries: u32) -> Result<Value, AiError>;
}

/// Gemini API client.
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gemini_api_key.clone(), config.gemini_base_url.clone())
    }

    async fn request(&self, api_key: &str, prompt: &str) -> Result<String, RequestFailure> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(RequestFailure::transport)?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(RequestFailure::api(status.as_u16(), &raw));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| RequestFailure {
                message: format!("failed to parse response: {e}"),
                rate_limited: false,
                retry_delay_ms: None,
            })?;

        Ok(parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, max_retries: u32) -> Result<Value, AiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AiError::MissingApiKey);
        };

        for attempt in 0..=max_retries {
            match self.request(api_key, prompt).await {
                Ok(text) => return Ok(parse::extract_json(&text)),
                Err(failure) if failure.rate_limited => {
                    let delay_ms = failure.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);

                    if attempt == max_retries {
                        return Err(if failure.quota_exceeded() {
                            AiError::QuotaExceeded {
                                message: "Gemini API quota exceeded. Please check your plan \
                                          and billing details. You may need to upgrade your \
                                          plan or wait for the quota to reset."
                                    .to_string(),
                                retry_after_ms: delay_ms,
                            }
                        } else {
                            AiError::RateLimited {
                                retry_after_ms: delay_ms,
                            }
                        });
                    }

                    tracing::warn!(
                        "Gemini rate limited, retrying in {}ms (attempt {} of {})",
                        delay_ms,
                        attempt + 1,
                        max_retries + 1
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(failure) => return Err(AiError::Upstream(failure.message)),
            }
        }

        // The loop always returns; this is a defensive fallback.
        Err(AiError::Upstream(
            "Failed to generate content after multiple attempts".to_string(),
        ))
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Google RPC error envelope: `{"error": {"code", "message", "status",
/// "details": [...]}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

/// Classified outcome of a single failed attempt.
struct RequestFailure {
    message: String,
    rate_limited: bool,
    retry_delay_ms: Option<u64>,
}

impl RequestFailure {
    fn transport(err: reqwest::Error) -> Self {
        let message = err.to_string();
        let rate_limited = mentions_rate_limit(&message);
        Self {
            message,
            rate_limited,
            retry_delay_ms: None,
        }
    }

    fn api(http_status: u16, raw_body: &str) -> Self {
        let body = serde_json::from_str::<ErrorEnvelope>(raw_body)
            .map(|e| e.error)
            .unwrap_or_default();
        let message = body.message.clone().unwrap_or_else(|| {
            if raw_body.is_empty() {
                format!("HTTP {http_status}")
            } else {
                raw_body.to_string()
            }
        });

        let rate_limited = http_status == 429
            || body.code == Some(429)
            || body.status.as_deref() == Some("RESOURCE_EXHAUSTED")
            || mentions_rate_limit(&message);

        let retry_delay_ms =
            retry_info_delay_ms(&body.details).or_else(|| message_delay_ms(&message));

        Self {
            message,
            rate_limited,
            retry_delay_ms,
        }
    }

    fn quota_exceeded(&self) -> bool {
        self.message.to_lowercase().contains("quota")
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("429")
        || lower.contains("resource_exhausted")
}

/// Delay from a `google.rpc.RetryInfo` detail (`"retryDelay": "1.5s"`),
/// converted to milliseconds and rounded up.
fn retry_info_delay_ms(details: &[Value]) -> Option<u64> {
    for detail in details {
        let is_retry_info = detail
            .get("@type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"));
        if !is_retry_info {
            continue;
        }
        let Some(delay) = detail.get("retryDelay").and_then(Value::as_str) else {
            continue;
        };
        if let Ok(seconds) = delay.trim_end_matches('s').parse::<f64>() {
            return Some((seconds * 1000.0).ceil() as u64);
        }
    }
    None
}

/// Delay from a "retry in N s" phrase in the error message.
fn message_delay_ms(message: &str) -> Option<u64> {
    static RETRY_IN: OnceLock<Regex> = OnceLock::new();
    let re = RETRY_IN
        .get_or_init(|| Regex::new(r"(?i)retry in ([0-9.]+)s").expect("retry regex"));
    let captured = re.captures(message)?.get(1)?;
    let seconds: f64 = captured.as_str().parse().ok()?;
    Some((seconds * 1000.0).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        })
    }

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(Some("test-key".to_string()), Some(server.uri()))
    }

    #[tokio::test]
    async fn successful_generation_returns_parsed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-3-flash-preview:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("```json\n{\"title\": \"Oceans\"}\n```")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).generate("make a quiz", 3).await.unwrap();
        assert_eq!(result["title"], "Oceans");
    }

    #[tokio::test]
    async fn unparsable_reply_is_returned_as_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("no json here")))
            .mount(&server)
            .await;

        let result = client_for(&server).generate("make a quiz", 3).await.unwrap();
        assert_eq!(result, Value::String("no json here".to_string()));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_calling_upstream() {
        let client = GeminiClient::new(None, None);
        let err = client.generate("make a quiz", 3).await.unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey));
        assert_eq!(err.to_string(), "Gemini API key not set");
    }

    #[tokio::test]
    async fn rate_limit_waits_suggested_delay_then_retries() {
        let server = MockServer::start().await;
        let throttled = serde_json::json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted",
                "status": "RESOURCE_EXHAUSTED",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.RetryInfo",
                    "retryDelay": "0.05s"
                }]
            }
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(&throttled))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("{\"ok\": true}")))
            .expect(1)
            .mount(&server)
            .await;

        let start = Instant::now();
        let result = client_for(&server).generate("make a quiz", 3).await.unwrap();
        assert_eq!(result["ok"], true);
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "retry should wait the suggested delay"
        );
    }

    #[tokio::test]
    async fn quota_exhaustion_surfaces_after_final_attempt() {
        let server = MockServer::start().await;
        let throttled = serde_json::json!({
            "error": {
                "code": 429,
                "message": "You exceeded your current quota. Please retry in 0.05s.",
                "status": "RESOURCE_EXHAUSTED"
            }
        });
        // maxRetries = 1 -> exactly 2 attempts.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(&throttled))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server).generate("make a quiz", 1).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("quota exceeded"));
        assert_eq!(err.retry_after_ms(), Some(50));
    }

    #[tokio::test]
    async fn plain_rate_limit_reports_retry_hint() {
        let server = MockServer::start().await;
        let throttled = serde_json::json!({
            "error": { "code": 429, "message": "Rate limit hit", "status": "RESOURCE_EXHAUSTED" }
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(&throttled))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).generate("make a quiz", 0).await.unwrap_err();
        assert!(matches!(err, AiError::RateLimited { .. }));
        // No hint in the body -> default backoff.
        assert_eq!(err.retry_after_ms(), Some(2000));
        assert!(err.to_string().contains("retry after 2 seconds"));
    }

    #[tokio::test]
    async fn non_rate_limit_errors_are_not_retried() {
        let server = MockServer::start().await;
        let broken = serde_json::json!({
            "error": { "code": 500, "message": "Internal failure", "status": "INTERNAL" }
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(&broken))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).generate("make a quiz", 3).await.unwrap_err();
        assert!(matches!(err, AiError::Upstream(_)));
        assert_eq!(err.to_string(), "Internal failure");
        assert_eq!(err.retry_after_ms(), None);
    }
}
