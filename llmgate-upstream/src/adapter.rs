//! The chat-completion capability and its HTTP implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use llmgate_core::{
    Completion, CompletionRequest, ErrorKind, ProviderConfig, redact_header, redact_secret,
    redact_value,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dialect::{dialect_for, error_message};
use crate::error::{HttpError, UpstreamError, classify_status};
use crate::http::HttpClient;

// ============================================================================
// Exchange
// ============================================================================

/// The outbound half of an exchange, with the credential redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundRequest {
    /// Endpoint URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Headers as sent, credential replaced by the placeholder.
    pub headers: BTreeMap<String, String>,
    /// JSON body as sent.
    pub body: Value,
}

/// The inbound half of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundResponse {
    /// HTTP status.
    pub status: u16,
    /// Parsed JSON body, or the raw text as a string when not JSON.
    pub body: Value,
    /// Dispatch-to-response latency.
    pub elapsed_ms: u64,
}

/// One upstream call: what was sent, what came back, and the verdict.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Redacted outbound request.
    pub request: OutboundRequest,
    /// Inbound response, absent when the provider never answered.
    pub response: Option<InboundResponse>,
    /// Parsed completion or classified failure.
    pub outcome: Result<Completion, UpstreamError>,
}

impl Exchange {
    /// Returns the latency of the call, success or failure.
    pub fn elapsed_ms(&self) -> u64 {
        match &self.outcome {
            Ok(completion) => completion.latency_ms,
            Err(err) => err.elapsed_ms,
        }
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Capability to obtain a chat completion from a provider.
///
/// Implementations are pure translation plus transport: they never touch
/// registry or ledger state.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Performs one call and returns the full exchange.
    async fn exchange(&self, provider: &ProviderConfig, request: &CompletionRequest) -> Exchange;

    /// Performs one call and returns only its outcome.
    async fn send(
        &self,
        provider: &ProviderConfig,
        request: &CompletionRequest,
    ) -> Result<Completion, UpstreamError> {
        self.exchange(provider, request).await.outcome
    }
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// [`ChatCompletion`] over HTTP, dispatching on the provider's family.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    http: HttpClient,
}

impl HttpChatClient {
    /// Creates a client whose calls are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    #[instrument(skip(self, provider, request), fields(provider = %provider.id, model = %request.model))]
    async fn exchange(&self, provider: &ProviderConfig, request: &CompletionRequest) -> Exchange {
        let dialect = dialect_for(provider.family);
        let secret = provider.credential.as_str();
        let body = dialect.body(request);

        let mut outbound = OutboundRequest {
            url: provider.base_url.to_string(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: body.clone(),
        };
        redact_value(&mut outbound.body, secret);

        let fail = |outbound: OutboundRequest, kind: ErrorKind, message: String| Exchange {
            request: outbound,
            response: None,
            outcome: Err(UpstreamError::new(kind, message)),
        };

        let url = match provider.chat_endpoint() {
            Ok(url) => url,
            Err(e) => return fail(outbound, ErrorKind::Unreachable, e.to_string()),
        };
        outbound.url = url.to_string();

        let headers = match dialect.auth_headers(secret) {
            Ok(headers) => headers,
            Err(e) => return fail(outbound, ErrorKind::Rejected, e.to_string()),
        };
        outbound
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        for (name, value) in &headers {
            let shown = value
                .to_str()
                .map_or_else(|_| String::new(), |v| redact_header(v, secret));
            outbound.headers.insert(name.as_str().to_string(), shown);
        }

        let payload = match serde_json::to_vec(&body) {
            Ok(payload) => payload,
            Err(e) => return fail(outbound, ErrorKind::Rejected, e.to_string()),
        };

        let raw = match self.http.post_json(&url, headers, payload).await {
            Ok(raw) => raw,
            Err(mut err) => {
                err.message = redact_secret(&err.message, secret);
                debug!(kind = %err.kind, elapsed_ms = err.elapsed_ms, "Upstream unreachable");
                return Exchange {
                    request: outbound,
                    response: None,
                    outcome: Err(err),
                };
            }
        };

        let mut response_body = serde_json::from_str::<Value>(&raw.body)
            .unwrap_or_else(|_| Value::String(raw.body.clone()));
        redact_value(&mut response_body, secret);

        let outcome = if raw.is_success() {
            dialect
                .parse(&response_body, &request.model)
                .map(|parsed| Completion {
                    text: parsed.text,
                    tokens_in: parsed.tokens_in,
                    tokens_out: parsed.tokens_out,
                    latency_ms: raw.elapsed_ms,
                    model: parsed.model,
                })
                .map_err(|message| {
                    UpstreamError::new(ErrorKind::InvalidResponse, message)
                        .with_status(raw.status)
                        .with_elapsed(raw.elapsed_ms)
                })
        } else {
            let message = redact_secret(&error_message(&raw.body, raw.status), secret);
            Err(UpstreamError::new(classify_status(raw.status), message)
                .with_status(raw.status)
                .with_elapsed(raw.elapsed_ms)
                .with_retry_after(raw.retry_after_ms))
        };

        match &outcome {
            Ok(c) => debug!(
                status = raw.status,
                latency_ms = c.latency_ms,
                tokens_in = c.tokens_in,
                tokens_out = c.tokens_out,
                "Upstream call succeeded"
            ),
            Err(e) => debug!(status = raw.status, kind = %e.kind, "Upstream call failed"),
        }

        Exchange {
            request: outbound,
            response: Some(InboundResponse {
                status: raw.status,
                body: response_body,
                elapsed_ms: raw.elapsed_ms,
            }),
            outcome,
        }
    }
}
