//! HTTP client with tracing and a bounded per-request timeout.

use std::time::{Duration, Instant};

use reqwest::{Client, header, header::HeaderMap};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{HttpError, UpstreamError};

/// User agent string for llmgate.
const USER_AGENT: &str = concat!("llmgate/", env!("CARGO_PKG_VERSION"));

/// Raw answer of an upstream, before dialect parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body as text.
    pub body: String,
    /// `Retry-After` header in milliseconds, if present and numeric.
    pub retry_after_ms: Option<u64>,
    /// Time from dispatch until the full body was received.
    pub elapsed_ms: u64,
}

impl RawResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper used by the chat adapter.
///
/// Every call is bounded by the client-wide timeout, which covers connect,
/// send and reading the full body.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { inner: client })
    }

    /// Performs a POST with a pre-serialized JSON body.
    ///
    /// The latency clock starts after marshaling, at dispatch, and stops
    /// when the full body (or a terminal error) has been received.
    ///
    /// # Errors
    ///
    /// Returns a classified [`UpstreamError`] when no HTTP response was
    /// received (timeout, connection failure). HTTP error statuses are not
    /// errors at this layer.
    #[instrument(skip(self, headers, body), fields(url = %url))]
    pub async fn post_json(
        &self,
        url: &Url,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<RawResponse, UpstreamError> {
        let request = self
            .inner
            .post(url.clone())
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body);

        debug!("POST request");
        let started = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed_ms = elapsed_ms(started);
                debug!(error = %e, elapsed_ms, "Request failed");
                return Err(UpstreamError::from_transport(e, elapsed_ms));
            }
        };

        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1_000));

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let elapsed_ms = elapsed_ms(started);
                debug!(error = %e, status, elapsed_ms, "Reading body failed");
                return Err(UpstreamError::from_transport(e, elapsed_ms).with_status(status));
            }
        };

        let elapsed_ms = elapsed_ms(started);
        debug!(status, elapsed_ms, bytes = body.len(), "Response received");

        Ok(RawResponse {
            status,
            body,
            retry_after_ms,
            elapsed_ms,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
