//! Diagnostic test harness.
//!
//! Tests exactly one provider with a synthetic message. There is no retry
//! and no fallback: the result describes the targeted provider only.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use llmgate_core::{
    ChatError, ChatRequest, CompletionRequest, ConnectionStatus, ErrorKind, ProviderConfig,
};
use llmgate_store::Registry;
use llmgate_upstream::{ChatCompletion, Exchange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::GatewayError;

/// Message sent when the caller does not supply one.
pub const DEFAULT_TEST_MESSAGE: &str = "Hello! Reply with a short greeting to confirm you are working.";

// ============================================================================
// Request / Result Types
// ============================================================================

/// Body of a test request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestRequest {
    /// Synthetic message to send.
    #[serde(default)]
    pub message: Option<String>,
    /// Capture the exchange in [`TestResult::raw_data`].
    #[serde(default)]
    pub include_raw_data: bool,
}

/// Whether the provider was reachable and accepted the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    /// Reachable and authenticated.
    pub success: bool,
    /// Short human-readable verdict.
    pub message: String,
    /// Time from dispatch to response or terminal error.
    pub latency_ms: u64,
}

/// Whether the provider produced a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCheck {
    /// A completion was produced.
    pub success: bool,
    /// Completion text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Failure on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChatError>,
    /// Model that answered, or the configured model on failure.
    pub model: String,
    /// Prompt tokens reported by the provider.
    pub tokens_in: u64,
    /// Completion tokens reported by the provider.
    pub tokens_out: u64,
}

/// Outbound request as captured for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    /// Endpoint URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Headers, with the credential replaced by a placeholder.
    pub headers: BTreeMap<String, String>,
    /// JSON body exactly as sent.
    pub body: Value,
    /// The synthetic message that was sent.
    pub message: String,
}

/// Structured description of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Provider-reported or transport error message.
    pub message: String,
    /// Stable failure kind.
    pub kind: ErrorKind,
    /// Time from dispatch to the terminal error.
    pub elapsed_ms: u64,
}

/// Full request and response capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    /// What was sent.
    pub request: RawRequest,
    /// Parsed response body, when one was received.
    pub response: Option<Value>,
    /// Present whenever the exchange failed.
    pub error_details: Option<ErrorDetails>,
}

/// Result of one diagnostic test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Provider that was tested.
    pub provider_id: String,
    /// Connectivity verdict.
    pub connection_test: ConnectionCheck,
    /// Completion verdict.
    pub chat_test: ChatCheck,
    /// Exchange capture, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<RawData>,
    /// When the test ran.
    pub tested_at: DateTime<Utc>,
}

impl TestResult {
    /// Builds a result from a completed exchange.
    pub fn from_exchange(
        provider: &ProviderConfig,
        message: &str,
        exchange: Exchange,
        include_raw_data: bool,
        tested_at: DateTime<Utc>,
    ) -> Self {
        let latency_ms = exchange.elapsed_ms();
        let connection_test = connection_check(&exchange, latency_ms);

        let chat_test = match &exchange.outcome {
            Ok(completion) => ChatCheck {
                success: true,
                response: Some(completion.text.clone()),
                error: None,
                model: completion.model.clone(),
                tokens_in: completion.tokens_in,
                tokens_out: completion.tokens_out,
            },
            Err(err) => ChatCheck {
                success: false,
                response: None,
                error: Some(err.to_chat_error()),
                model: provider.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
            },
        };

        let raw_data = include_raw_data.then(|| RawData {
            error_details: exchange.outcome.as_ref().err().map(|err| ErrorDetails {
                status: err.status,
                message: err.message.clone(),
                kind: err.kind,
                elapsed_ms: err.elapsed_ms,
            }),
            response: exchange.response.map(|r| r.body),
            request: RawRequest {
                url: exchange.request.url,
                method: exchange.request.method,
                headers: exchange.request.headers,
                body: exchange.request.body,
                message: message.to_string(),
            },
        });

        Self {
            provider_id: provider.id.clone(),
            connection_test,
            chat_test,
            raw_data,
            tested_at,
        }
    }

    /// Status to record for the provider after this test.
    pub fn status(&self) -> ConnectionStatus {
        if self.chat_test.success {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Error
        }
    }
}

fn connection_check(exchange: &Exchange, latency_ms: u64) -> ConnectionCheck {
    let (success, message) = match (&exchange.response, &exchange.outcome) {
        (_, Ok(_)) => (true, "Connected".to_string()),
        (Some(response), Err(err)) if err.kind != ErrorKind::AuthFailure => (
            true,
            format!("Reachable (HTTP {}), but the request failed", response.status),
        ),
        (Some(response), Err(_)) => (
            false,
            format!("Credential rejected (HTTP {})", response.status),
        ),
        (None, Err(err)) => (false, format!("Connection failed: {}", err.kind)),
    };
    ConnectionCheck {
        success,
        message,
        latency_ms,
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Runs diagnostic tests against single providers.
pub struct TestHarness {
    registry: Arc<Registry>,
    client: Arc<dyn ChatCompletion>,
    track_status: bool,
}

impl TestHarness {
    /// Creates a harness that records each result as the provider's status.
    pub fn new(registry: Arc<Registry>, client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            registry,
            client,
            track_status: true,
        }
    }

    /// Stops the harness from writing results back to the registry.
    ///
    /// For callers holding a registry copy that another process may have
    /// changed since it was loaded.
    #[must_use]
    pub fn without_status_tracking(mut self) -> Self {
        self.track_status = false;
        self
    }

    /// Tests one provider and, when tracking, records its connection status.
    ///
    /// Disabled providers can be tested; the test is how a credential is
    /// checked before enabling it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown id. Provider
    /// failures are reported inside the [`TestResult`], not as errors.
    #[instrument(skip(self, request), fields(raw = request.include_raw_data))]
    pub async fn test(&self, provider_id: &str, request: &TestRequest) -> Result<TestResult, GatewayError> {
        let provider = self.registry.get(provider_id).await?;
        let settings = self.registry.settings().await;

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_TEST_MESSAGE)
            .to_string();

        let completion_request =
            CompletionRequest::resolve(&ChatRequest::new(message.clone()), &provider, &settings);
        let exchange = self.client.exchange(&provider, &completion_request).await;

        let tested_at = Utc::now();
        let result = TestResult::from_exchange(
            &provider,
            &message,
            exchange,
            request.include_raw_data,
            tested_at,
        );

        if self.track_status {
            if let Err(e) = self.registry.set_status(&provider.id, result.status(), tested_at).await {
                warn!(provider = %provider.id, error = %e, "Failed to record provider status");
            }
        }

        info!(
            provider = %provider.id,
            connected = result.connection_test.success,
            chat = result.chat_test.success,
            latency_ms = result.connection_test.latency_ms,
            "Provider test finished"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("track_status", &self.track_status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llmgate_core::{Completion, ProviderPatch, REDACTED, Settings};
    use llmgate_store::RegistryFile;
    use llmgate_upstream::{InboundResponse, OutboundRequest, UpstreamError};
    use serde_json::json;
    use tempfile::TempDir;
    use url::Url;

    fn provider() -> ProviderConfig {
        ProviderConfig::new("x", "X", "m1", Url::parse("http://127.0.0.1:9/v1").unwrap())
            .with_credential("sk-secret")
    }

    fn request() -> OutboundRequest {
        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {REDACTED}"));
        OutboundRequest {
            url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            method: "POST".to_string(),
            headers,
            body: json!({"model": "m1"}),
        }
    }

    #[test]
    fn test_auth_failure_fails_connection_with_details() {
        let exchange = Exchange {
            request: request(),
            response: Some(InboundResponse {
                status: 401,
                body: json!({"error": {"message": "bad key"}}),
                elapsed_ms: 30,
            }),
            outcome: Err(UpstreamError::new(ErrorKind::AuthFailure, "bad key")
                .with_status(401)
                .with_elapsed(30)),
        };

        let result = TestResult::from_exchange(&provider(), "ping", exchange, true, Utc::now());

        assert!(!result.connection_test.success);
        assert!(!result.chat_test.success);
        assert_eq!(result.status(), ConnectionStatus::Error);
        let raw = result.raw_data.unwrap();
        assert_eq!(raw.request.message, "ping");
        let details = raw.error_details.unwrap();
        assert_eq!(details.status, Some(401));
        assert_eq!(details.message, "bad key");
        assert_eq!(details.elapsed_ms, 30);
    }

    #[test]
    fn test_server_error_is_reachable_but_failed() {
        let exchange = Exchange {
            request: request(),
            response: Some(InboundResponse {
                status: 500,
                body: json!({}),
                elapsed_ms: 5,
            }),
            outcome: Err(UpstreamError::new(ErrorKind::ServerError, "boom").with_status(500)),
        };

        let result = TestResult::from_exchange(&provider(), "ping", exchange, false, Utc::now());

        assert!(result.connection_test.success);
        assert!(!result.chat_test.success);
        assert!(result.raw_data.is_none());
    }

    #[test]
    fn test_unreachable_has_details_without_response() {
        let exchange = Exchange {
            request: request(),
            response: None,
            outcome: Err(UpstreamError::new(ErrorKind::Unreachable, "refused").with_elapsed(2)),
        };

        let result = TestResult::from_exchange(&provider(), "ping", exchange, true, Utc::now());

        assert!(!result.connection_test.success);
        let raw = result.raw_data.unwrap();
        assert!(raw.response.is_none());
        assert_eq!(raw.error_details.unwrap().kind, ErrorKind::Unreachable);
    }

    #[test]
    fn test_success_serializes_snake_case_raw_fields() {
        let exchange = Exchange {
            request: request(),
            response: Some(InboundResponse {
                status: 200,
                body: json!({"text": "pong"}),
                elapsed_ms: 8,
            }),
            outcome: Ok(Completion {
                text: "pong".to_string(),
                tokens_in: 1,
                tokens_out: 1,
                latency_ms: 8,
                model: "m1".to_string(),
            }),
        };

        let result = TestResult::from_exchange(&provider(), "ping", exchange, true, Utc::now());
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["connectionTest"]["success"], true);
        assert_eq!(value["chatTest"]["response"], "pong");
        assert!(value["rawData"]["error_details"].is_null());
        assert_eq!(value["rawData"]["response"]["text"], "pong");
        assert!(!value.to_string().contains("sk-secret"));
    }

    #[test]
    fn test_request_body_defaults() {
        let request: TestRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, TestRequest::default());

        let request: TestRequest =
            serde_json::from_str(r#"{"message":"hi","includeRawData":true}"#).unwrap();
        assert!(request.include_raw_data);
        assert!(serde_json::from_str::<TestRequest>(r#"{"bogus":1}"#).is_err());
    }

    struct PongUpstream;

    #[async_trait]
    impl ChatCompletion for PongUpstream {
        async fn exchange(&self, _provider: &ProviderConfig, _request: &CompletionRequest) -> Exchange {
            Exchange {
                request: request(),
                response: Some(InboundResponse {
                    status: 200,
                    body: json!({"text": "pong"}),
                    elapsed_ms: 3,
                }),
                outcome: Ok(Completion {
                    text: "pong".to_string(),
                    tokens_in: 1,
                    tokens_out: 1,
                    latency_ms: 3,
                    model: "m1".to_string(),
                }),
            }
        }
    }

    async fn registry_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("providers.json");
        let file = RegistryFile {
            settings: Settings {
                default_provider: "x".to_string(),
                ..Settings::default()
            },
            providers: vec![provider()],
        };
        Registry::create(&path, file).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_tracking_harness_records_status() {
        let dir = TempDir::new().unwrap();
        let path = registry_file(&dir).await;
        let registry = Arc::new(Registry::load(&path).await.unwrap());
        let harness = TestHarness::new(registry.clone(), Arc::new(PongUpstream));

        let result = harness.test("x", &TestRequest::default()).await.unwrap();
        assert!(result.chat_test.success);

        let stored = Registry::load(&path).await.unwrap().get("x").await.unwrap();
        assert_eq!(stored.status, ConnectionStatus::Connected);
        assert_eq!(stored.last_checked, Some(result.tested_at));
    }

    #[tokio::test]
    async fn test_untracked_harness_leaves_newer_changes_alone() {
        let dir = TempDir::new().unwrap();
        let path = registry_file(&dir).await;

        // Loaded before the other process writes.
        let stale = Arc::new(Registry::load(&path).await.unwrap());
        let live = Registry::load(&path).await.unwrap();
        let patch = ProviderPatch {
            model: Some("m2".to_string()),
            ..Default::default()
        };
        live.update("x", &patch).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let harness = TestHarness::new(stale, Arc::new(PongUpstream)).without_status_tracking();
        let result = harness.test("x", &TestRequest::default()).await.unwrap();
        assert!(result.chat_test.success);

        assert_eq!(std::fs::read(&path).unwrap(), before);
        let stored = Registry::load(&path).await.unwrap().get("x").await.unwrap();
        assert_eq!(stored.model, "m2");
        assert_eq!(stored.last_checked, None);
    }
}
