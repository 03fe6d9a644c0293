use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::redirect::Policy;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{CountSource, ItemSource, TransportError};
use crate::filter::{join_ids, CategoryId, FilterQuery, FilterResponse};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Error bodies are only mined for a message; no need to read much.
const MAX_ERROR_BODY_SIZE: usize = 16 * 1024;

/// Endpoints and limits for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub filter_path: String,
    pub count_path: String,
    /// Hard ceiling for a single call, independent of the controller's
    /// optional per-request budget.
    pub client_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            filter_path: "/products/".to_string(),
            count_path: "/products/api/products/count/".to_string(),
            client_timeout: Duration::from_secs(30),
        }
    }
}

/// Redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Listing and count endpoints over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    filter_url: Url,
    count_url: Url,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.client_timeout)
            .build()?;

        let base = Url::parse(&config.base_url)?;
        let filter_url = base.join(&config.filter_path)?;
        let count_url = base.join(&config.count_path)?;

        tracing::debug!(filter_url = %filter_url, count_url = %count_url, "HTTP transport configured");

        Ok(Self {
            client,
            filter_url,
            count_url,
        })
    }

    /// Full listing URL for `query`.
    pub fn listing_url(&self, query: &FilterQuery) -> Url {
        let mut url = self.filter_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.params() {
                pairs.append_pair(key, &value);
            }
        }
        url
    }

    /// Full advisory count URL for `categories`.
    pub fn count_url(&self, categories: &[CategoryId]) -> Url {
        let mut url = self.count_url.clone();
        url.query_pairs_mut()
            .append_pair("category", &join_ids(categories));
        url
    }

    async fn get_text(&self, url: Url) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_limited_text(response, MAX_ERROR_BODY_SIZE)
                .await
                .ok()
                .and_then(|body| server_message(&body));
            return Err(TransportError::Server {
                status: status.as_u16(),
                message,
            });
        }

        read_limited_text(response, MAX_RESPONSE_SIZE).await
    }

    async fn fetch_listing(&self, query: &FilterQuery) -> Result<FilterResponse, TransportError> {
        let url = self.listing_url(query);
        tracing::debug!(url = %url, "Fetching listing");
        let body = self.get_text(url).await?;
        Ok(FilterResponse::from_body(&body))
    }

    async fn fetch_count(&self, categories: &[CategoryId]) -> Result<u64, TransportError> {
        #[derive(Deserialize)]
        struct CountBody {
            product_count: Option<u64>,
        }

        let url = self.count_url(categories);
        tracing::debug!(url = %url, "Fetching advisory count");
        let body = self.get_text(url).await?;
        let parsed: CountBody = serde_json::from_str(&body)
            .map_err(|e| TransportError::Malformed(format!("count body: {}", e)))?;
        parsed
            .product_count
            .ok_or_else(|| TransportError::Malformed("missing product_count".to_string()))
    }
}

impl ItemSource for HttpTransport {
    fn fetch<'a>(
        &'a self,
        query: &'a FilterQuery,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<FilterResponse, TransportError>> {
        async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Aborted),
                result = self.fetch_listing(query) => result,
            }
        }
        .boxed()
    }
}

impl CountSource for HttpTransport {
    fn count<'a>(
        &'a self,
        categories: &'a [CategoryId],
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<u64, TransportError>> {
        async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Aborted),
                result = self.fetch_count(categories) => result,
            }
        }
        .boxed()
    }
}

/// Pull a human-readable message out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, TransportError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes)
        .map_err(|_| TransportError::Malformed("invalid UTF-8 in response".to_string()))
}
