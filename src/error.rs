//! Error types for the wave hack viewer.
//!
//! Upstream failures are classified here once, so every transport (JSON API,
//! HTML pages, tool calls) reports the same message for the same failure.

use axum::http::StatusCode;
use reqwest_retry::RetryError;
use thiserror::Error;

/// Message used when an error carries no text of its own.
const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Custom error type for wave hack operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Upstream body was not the JSON shape we expect.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Any reqwest failure that is neither a timeout nor a connect error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Failure raised inside the client middleware stack.
    #[error("HTTP middleware error: {0}")]
    Middleware(String),

    /// The request exceeded the client's configured timeout.
    #[error("request timeout while calling {url}")]
    Timeout { url: String },

    /// Connection-level failure (DNS, refused, reset).
    #[error("network error while calling {url}: {message}")]
    Network { url: String, message: String },

    /// The detail endpoint has no record for this id.
    #[error("wave hack {id} not found")]
    NotFound { id: String },

    /// Upstream answered with a non-success status after retries ran out.
    #[error("Request failed with status code {status}: GET {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Caller supplied arguments that cannot be turned into a request.
    #[error("{0}")]
    InvalidInput(String),

    /// Startup configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error rendering an HTML template.
    #[error("Template render error: {0}")]
    Template(#[from] tera::Error),
}

impl AppError {
    /// Classifies a transport error from the middleware client.
    ///
    /// The retry middleware may wrap the reqwest error it gave up on, so the
    /// cause chain is searched before falling back to a generic failure.
    pub fn from_transport(err: reqwest_middleware::Error, url: &str) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => Self::from_reqwest(err, url),
            reqwest_middleware::Error::Middleware(err) => match transport_cause(&err) {
                Some(cause) if cause.is_timeout() => AppError::Timeout {
                    url: url.to_string(),
                },
                Some(cause) if cause.is_connect() => AppError::Network {
                    url: url.to_string(),
                    message: cause.to_string(),
                },
                _ => AppError::Middleware(format!("{err:#}")),
            },
        }
    }

    /// Classifies a transport error from reqwest.
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            AppError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            AppError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            AppError::HttpRequest(err)
        }
    }

    /// Message shown to users and returned in failure envelopes.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound { .. } => "Wave hack not found".to_string(),
            AppError::Timeout { .. } => {
                "Request timeout - the API is taking too long to respond".to_string()
            }
            AppError::Network { .. } => "Network error - unable to reach the API".to_string(),
            other => {
                let raw = other.to_string();
                if raw.trim().is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    raw
                }
            }
        }
    }

    /// HTTP status used when this error is returned from the JSON API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } | AppError::UpstreamStatus { status: 404, .. } => {
                StatusCode::NOT_FOUND
            }
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn transport_cause(err: &anyhow::Error) -> Option<&reqwest::Error> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<reqwest::Error>() {
            return Some(err);
        }
        let wrapped = match cause.downcast_ref::<RetryError>() {
            Some(RetryError::WithRetries { err, .. }) | Some(RetryError::Error(err)) => Some(err),
            None => cause.downcast_ref::<reqwest_middleware::Error>(),
        };
        match wrapped {
            Some(reqwest_middleware::Error::Reqwest(err)) => Some(err),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16) -> AppError {
        AppError::UpstreamStatus {
            status,
            url: "https://api.akindo.io/public/wave-hacks/abc".into(),
        }
    }

    #[test]
    fn test_not_found_is_distinct() {
        let err = AppError::NotFound { id: "abc".into() };
        assert_eq!(err.user_message(), "Wave hack not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_plain_upstream_404_keeps_raw_message() {
        let err = upstream(404);
        assert!(!err.user_message().contains("Wave hack not found"));
        assert!(err.user_message().contains("404"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_timeout_message() {
        let err = AppError::Timeout {
            url: "https://api.akindo.io/public/wave-hacks".into(),
        };
        assert!(err.user_message().to_lowercase().contains("timeout"));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_network_message() {
        let err = AppError::Network {
            url: "https://api.akindo.io/public/wave-hacks".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.user_message(),
            "Network error - unable to reach the API"
        );
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_other_errors_keep_raw_message() {
        let err = upstream(500);
        assert_eq!(err.user_message(), err.to_string());
        assert!(err.user_message().contains("500"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_message_falls_back_to_unknown() {
        let err = AppError::InvalidInput(String::new());
        assert_eq!(err.user_message(), UNKNOWN_ERROR);
    }

    #[test]
    fn test_invalid_input_is_bad_request() {
        let err = AppError::InvalidInput("Wave hack ID is required".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Wave hack ID is required");
    }
}
