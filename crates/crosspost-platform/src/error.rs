//! Error types for platform interactions.

use thiserror::Error;

use crate::Platform;

/// Errors that can occur when talking to a platform API.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Missing or expired credentials. Requires re-authentication, so this
    /// is never eligible for automatic retry.
    #[error("credential error: {0}")]
    Credential(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform API rejected the request.
    #[error("{platform} API error ({status}): {message}")]
    Api {
        platform: Platform,
        status: u16,
        message: String,
    },

    /// Bounded status polling exhausted its attempts.
    #[error("{platform} media processing timed out after {attempts} attempts")]
    Timeout { platform: Platform, attempts: u32 },

    /// No API endpoint configured for the platform.
    #[error("no API endpoint configured for {platform}")]
    NotConfigured { platform: Platform },

    /// Rate limited.
    #[error("rate limited{}", match retry_after_secs {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },
}

impl PlatformError {
    /// Whether a later attempt could reasonably succeed without human action.
    ///
    /// Credential failures require re-authentication and are excluded.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PlatformError::Credential(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_not_retryable() {
        assert!(!PlatformError::Credential("expired".to_string()).is_retryable());
    }

    #[test]
    fn api_and_timeout_errors_are_retryable() {
        let api = PlatformError::Api {
            platform: Platform::Twitter,
            status: 500,
            message: "oops".to_string(),
        };
        assert!(api.is_retryable());

        let timeout = PlatformError::Timeout {
            platform: Platform::Instagram,
            attempts: 10,
        };
        assert!(timeout.is_retryable());
    }

    #[test]
    fn rate_limited_display_includes_retry_after() {
        let err = PlatformError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited (retry after 30s)");

        let bare = PlatformError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(bare.to_string(), "rate limited");
    }
}
