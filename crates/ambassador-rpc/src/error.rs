//! RPC error types.

use ambassador_tx::ProviderError;
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

    #[error("authentication failed at {url} (check the project id)")]
    AuthFailed { url: String },

    #[error("rate limited at {url}")]
    RateLimited { url: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            RpcError::HttpStatus { status, .. } => *status >= 500,
            RpcError::RateLimited { .. } => true,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RpcError::HttpStatus { status, .. } => Some(*status),
            RpcError::AuthFailed { .. } => Some(403),
            RpcError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<RpcError> for ProviderError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Http { .. } | RpcError::RateLimited { .. } | RpcError::Client(_) => {
                ProviderError::Transport(e.to_string())
            }
            _ => ProviderError::Response(e.to_string()),
        }
    }
}
