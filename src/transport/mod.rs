//! Cancellable access to the filtering and counting endpoints.
//!
//! The filter subsystem only sees the [`ItemSource`] and [`CountSource`]
//! traits. Every call takes a [`CancellationToken`]; cancelling it resolves the
//! call with [`TransportError::Aborted`], which callers treat as "superseded"
//! rather than as a failure.

mod http;

use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::filter::{CategoryId, FilterQuery, FilterResponse};

pub use http::{HttpTransport, TransportConfig};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request aborted")]
    Aborted,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("HTTP error: status {status}")]
    Server { status: u16, message: Option<String> },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    /// True when the call was superseded or torn down.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }

    /// True when issuing the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout(_) => true,
            TransportError::Server { status, .. } => *status >= 500 || *status == 429,
            TransportError::Malformed(_) => true,
            TransportError::Aborted
            | TransportError::ResponseTooLarge(_)
            | TransportError::InvalidUrl(_) => false,
        }
    }

    /// Message suitable for a notification.
    ///
    /// Server errors carry the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Network(_) => {
                "Couldn't reach the server. Check your connection.".to_string()
            }
            TransportError::Timeout(_) => "The server took too long to respond.".to_string(),
            TransportError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            TransportError::Server { status, .. } => {
                format!("Something went wrong loading results (status {}).", status)
            }
            other => other.to_string(),
        }
    }
}

/// Source of filtered listings.
pub trait ItemSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        query: &'a FilterQuery,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<FilterResponse, TransportError>>;
}

/// Source of advisory "items matching these categories" counts.
pub trait CountSource: Send + Sync {
    fn count<'a>(
        &'a self,
        categories: &'a [CategoryId],
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<u64, TransportError>>;
}
