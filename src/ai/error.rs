//! Text-generation error types.

use thiserror::Error;

/// Failures of a generation call, after retries are exhausted.
///
/// These never escape as panics or transport errors: handlers serialize
/// them into the reply body so callers always get a well-formed result.
#[derive(Debug, Clone, Error)]
pub enum AiError {
    /// No API credential was configured.
    #[error("Gemini API key not set")]
    MissingApiKey,

    /// The upstream quota is exhausted; retrying now will not help.
    #[error("{message}")]
    QuotaExceeded { message: String, retry_after_ms: u64 },

    /// Still rate-limited after the final attempt.
    #[error("Rate limit exceeded. Please retry after {} seconds.", .retry_after_ms.div_ceil(1000))]
    RateLimited { retry_after_ms: u64 },

    /// Any other upstream failure; surfaced immediately, never retried.
    #[error("{0}")]
    Upstream(String),
}

impl AiError {
    /// The backoff hint attached to rate-limit outcomes, in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AiError::QuotaExceeded { retry_after_ms, .. }
            | AiError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
