//! Transport errors of the GitLab and Dify clients.

use reqwest::StatusCode;

/// Failure of one HTTP call, after retries.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{service} rejected the credentials (401): {url}")]
    Unauthorized { service: &'static str, url: String },

    #[error("{service} denied access (403): {url}")]
    Forbidden { service: &'static str, url: String },

    #[error("{service} resource not found (404): {url}")]
    NotFound { service: &'static str, url: String },

    #[error("{service} returned {status} for {url}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Statuses that retrying will not fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. } | ApiError::NotFound { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        ApiError::Decode {
            service,
            message: message.into(),
        }
    }
}
