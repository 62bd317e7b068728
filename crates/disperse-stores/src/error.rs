//! Store error types

use disperse_core::error::RemoteError;
use thiserror::Error;

/// Errors talking to a hosting platform or registry API
#[derive(Debug, Error)]
pub enum StoreError {
    /// Credentials missing or rejected before a request was made
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API answered with a non-success status
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Response was well-formed HTTP but not what the API promises
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

fn is_transient_status(status: u16) -> bool {
    status == 408 || status >= 500
}

impl StoreError {
    /// Classify for the retry policy: network failures, timeouts, 429 and
    /// 5xx are worth retrying; everything else is permanent.
    pub fn into_remote(self, service: &str) -> RemoteError {
        let service_name = service.to_string();
        match self {
            StoreError::RateLimited { retry_after } => RemoteError::RateLimited {
                service: service_name,
                retry_after,
            },
            StoreError::ApiError { status: 429, .. } => RemoteError::RateLimited {
                service: service_name,
                retry_after: None,
            },
            StoreError::ApiError { status, message } if is_transient_status(status) => {
                RemoteError::transient(service, format!("{status} {message}"))
            }
            StoreError::ApiError { status, message } => {
                RemoteError::permanent(service, format!("{status} {message}"))
            }
            StoreError::Http(e) if e.is_timeout() => RemoteError::Timeout {
                service: service_name,
            },
            StoreError::Http(e) => match e.status().map(|s| s.as_u16()) {
                Some(status) if !is_transient_status(status) && status != 429 => {
                    RemoteError::permanent(service, e.to_string())
                }
                _ if e.is_decode() || e.is_builder() => RemoteError::permanent(service, e.to_string()),
                _ => RemoteError::transient(service, e.to_string()),
            },
            other => RemoteError::permanent(service, other.to_string()),
        }
    }
}
