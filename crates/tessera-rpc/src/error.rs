//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error calling {endpoint} at {url}: {source}")]
    Http {
        endpoint: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {endpoint} at {url}: {body}")]
    HttpStatus {
        endpoint: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("authentication failed at {url}")]
    AuthFailed { url: String },

    #[error("service error {code} from {endpoint}: {message}")]
    Service {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("no data in response from {endpoint}")]
    NoResult { endpoint: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            RpcError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RpcError {
        RpcError::HttpStatus {
            endpoint: "/web3/wallet/broadcast".into(),
            url: "http://localhost".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!RpcError::AuthFailed { url: "x".into() }.is_transient());
        assert!(!RpcError::Service {
            endpoint: "x".into(),
            code: 500,
            message: "nonce too low".into()
        }
        .is_transient());
    }
}
