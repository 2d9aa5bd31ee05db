//! Gemini API client
//!
//! Uses the non-streaming `generateContent` endpoint. Each call is one
//! attempt; retrying is the caller's business (see `completion`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::history::Turn;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// One remote completion attempt
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a reply for `contents`. An empty string is a valid reply.
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        contents: &[Turn],
    ) -> Result<String, ProviderError>;
}

/// HTTP client for the hosted Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        contents: &[Turn],
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest::new(system_instruction, contents);

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        Ok(parsed.text())
    }
}

/// Map a non-2xx response onto the error taxonomy
fn classify_error(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);

    let exhausted = detail
        .as_ref()
        .and_then(|d| d.status.as_deref())
        .map(|s| s == "RESOURCE_EXHAUSTED")
        .unwrap_or(false);

    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.trim().to_string());

    if status == 429 || exhausted {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Api { status, message }
    }
}

/// Check that the API host answers at all
pub async fn check_connectivity(base_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    client
        .get(format!("{}/models", base_url.trim_end_matches('/')))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .context("Failed to connect to the Gemini API")?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

impl GenerateRequest {
    fn new(system_instruction: &str, turns: &[Turn]) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: Some(system_instruction.to_string()) }],
            },
            contents: turns
                .iter()
                .map(|t| Content {
                    role: Some(t.role.wire_name().to_string()),
                    parts: vec![Part { text: Some(t.text.clone()) }],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, empty if there is none
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("again")];
        let json = serde_json::to_value(GenerateRequest::new("be kind", &turns)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "again");
    }

    #[test]
    fn test_parse_response_text() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), "Hello");
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.text(), "");

        let json = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn test_classify_rate_limit() {
        assert!(classify_error(429, "").is_rate_limit());

        let body = r#"{"error":{"code":400,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error(400, body).is_rate_limit());
    }

    #[test]
    fn test_classify_api_error() {
        let body = r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#;
        match classify_error(403, body) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected: {:?}", other),
        }

        match classify_error(502, "bad gateway\n") {
            ProviderError::Api { message, .. } => assert_eq!(message, "bad gateway"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::with_base_url("k", "http://localhost:1234/v1beta/");
        assert_eq!(
            client.endpoint("gemini-2.5-flash-preview-09-2025"),
            "http://localhost:1234/v1beta/models/gemini-2.5-flash-preview-09-2025:generateContent"
        );
    }
}
