//! Errors that end a single proxied request.

use hyper::{Response, StatusCode, header};
use std::time::Duration;
use thiserror::Error;

use crate::body::{ProxyBody, full};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("CONNECT target must be host:port, got {0}")]
    InvalidTarget(String),

    #[error("Failed to connect to {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connecting to {target} timed out after {}ms", .timeout.as_millis())]
    DialTimeout { target: String, timeout: Duration },

    #[error("Tunneling (connection upgrade) not supported")]
    UpgradeUnavailable,

    #[error("Request does not name a destination: {0}")]
    Destination(String),

    #[error("Failed to forward request: {0}")]
    Forward(#[from] hyper_util::client::legacy::Error),

    #[error("Failed to read message body: {0}")]
    Capture(#[source] hyper::Error),
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTarget(_)
            | Self::Dial { .. }
            | Self::DialTimeout { .. }
            | Self::Destination(_)
            | Self::Forward(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpgradeUnavailable | Self::Capture(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text error response carrying the error message as its body.
    #[must_use]
    pub fn into_response(self) -> Response<ProxyBody> {
        let status = self.status();
        let mut response = Response::new(full(format!("{self}\n")));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
