//! Error types for the completion path
//!
//! `ProviderError` is what a single remote attempt can fail with.
//! `CallFailure` is what a whole `complete` call ends in once the retry
//! policy has had its say.

use thiserror::Error;

/// Shown when the API rejected the request for a reason other than rate limiting.
pub const PROVIDER_FALLBACK: &str = "죄송합니다. API 처리 중 오류가 발생했습니다.";

/// Shown when the call failed outside the API (network, decoding, ...).
pub const UNEXPECTED_FALLBACK: &str = "죄송합니다. 처리 중 오류가 발생했습니다.";

/// Shown instead of calling out when no client is configured.
pub const NOT_INITIALIZED_GUIDANCE: &str =
    "죄송합니다. 챗봇 초기화가 완료되지 않았습니다. API 키를 확인하거나 초기화 버튼을 눌러주세요.";

/// Failure of one attempt against the remote completion API
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 or a RESOURCE_EXHAUSTED status from the provider
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other API-level rejection (bad request, auth, server fault)
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// API-level errors are reported verbatim; the rest are "unexpected".
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Terminal outcome of a completion call that did not produce text
#[derive(Debug, Error)]
pub enum CallFailure {
    #[error("rate limit still exceeded after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },

    #[error("provider rejected the request: {0}")]
    Provider(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),

    #[error("completion client is not initialized")]
    NotInitialized,
}

impl CallFailure {
    /// Text the host should append as the assistant reply, if any.
    ///
    /// Exhausted retries yield nothing, so the exchange is dropped from the
    /// conversation; every other failure keeps the UI consistent with a
    /// fixed apology or guidance string.
    pub fn fallback_text(&self) -> Option<&'static str> {
        match self {
            Self::RetriesExhausted { .. } => None,
            Self::Provider(_) => Some(PROVIDER_FALLBACK),
            Self::Unexpected(_) => Some(UNEXPECTED_FALLBACK),
            Self::NotInitialized => Some(NOT_INITIALIZED_GUIDANCE),
        }
    }
}
