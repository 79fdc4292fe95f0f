//! Chat router.
//!
//! Each request walks an explicit state machine:
//!
//! ```text
//! Resolve → Invoke → Success
//!                  ↘ NeedsFallback → InvokeFallback → Success | Failure
//! ```
//!
//! At most two providers are called per request. On total failure the
//! primary provider's error is reported.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use llmgate_core::{
    AttemptRecord, ChatError, ChatRequest, ChatResult, Completion, CompletionRequest, ErrorKind,
    ProviderConfig, Settings,
};
use llmgate_store::{Registry, RegistryFile, UsageLedger};
use llmgate_upstream::{ChatCompletion, RetryStrategy, UpstreamError};
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Route State
// ============================================================================

/// Where a request is in its route.
#[derive(Debug)]
enum RouteState {
    Resolve,
    Invoke {
        primary: ProviderConfig,
    },
    NeedsFallback {
        primary: String,
        error: UpstreamError,
    },
    InvokeFallback {
        primary: String,
        error: UpstreamError,
        fallback: ProviderConfig,
    },
    Success {
        provider: String,
        completion: Completion,
        fallback_used: bool,
    },
    Failure {
        provider: String,
        error: ChatError,
        latency_ms: u64,
        counted: bool,
    },
}

/// What the route produced, before accounting.
#[derive(Debug)]
enum RouteOutcome {
    Success {
        provider: String,
        completion: Completion,
        fallback_used: bool,
    },
    Failure {
        provider: String,
        error: ChatError,
        latency_ms: u64,
        counted: bool,
    },
}

// ============================================================================
// Chat Router
// ============================================================================

/// Routes chat requests to a provider, with retry and one-hop fallback.
pub struct ChatRouter {
    registry: Arc<Registry>,
    client: Arc<dyn ChatCompletion>,
    ledger: Arc<UsageLedger>,
}

impl ChatRouter {
    /// Creates a router over the given registry, upstream client and ledger.
    pub fn new(
        registry: Arc<Registry>,
        client: Arc<dyn ChatCompletion>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            registry,
            client,
            ledger,
        }
    }

    /// Routes one request to completion.
    ///
    /// Never fails: upstream errors end up in [`ChatResult::error`]. Every
    /// outcome that reached a provider is counted exactly once in the
    /// usage ledger.
    #[instrument(skip(self, request), fields(provider = request.provider_id.as_deref().unwrap_or("default")))]
    pub async fn route(&self, request: ChatRequest) -> ChatResult {
        // One consistent view of providers and settings for the whole request.
        let snapshot = self.registry.snapshot().await;
        let mut attempts = Vec::new();

        let outcome = self.run(&snapshot, &request, &mut attempts).await;
        self.account(outcome, Utc::now().date_naive(), attempts).await
    }

    async fn run(
        &self,
        snapshot: &RegistryFile,
        request: &ChatRequest,
        attempts: &mut Vec<AttemptRecord>,
    ) -> RouteOutcome {
        let settings = &snapshot.settings;
        let mut state = RouteState::Resolve;

        loop {
            state = match state {
                RouteState::Resolve => resolve(snapshot, request),

                RouteState::Invoke { primary } => {
                    let retry = RetryStrategy::new(settings.retry_attempts);
                    match self
                        .invoke(&primary, request, settings, &retry, attempts)
                        .await
                    {
                        Ok(completion) => RouteState::Success {
                            provider: primary.id,
                            completion,
                            fallback_used: false,
                        },
                        Err(error) if error.kind.is_fallback_eligible() => {
                            RouteState::NeedsFallback {
                                primary: primary.id,
                                error,
                            }
                        }
                        Err(error) => failed(primary.id, &error),
                    }
                }

                RouteState::NeedsFallback { primary, error } => {
                    match fallback_target(snapshot, &primary) {
                        Some(fallback) => {
                            warn!(
                                primary = %primary,
                                fallback = %fallback.id,
                                kind = %error.kind,
                                "Primary provider failed, trying fallback"
                            );
                            RouteState::InvokeFallback {
                                primary,
                                error,
                                fallback,
                            }
                        }
                        None => failed(primary, &error),
                    }
                }

                RouteState::InvokeFallback {
                    primary,
                    error,
                    fallback,
                } => {
                    let single = RetryStrategy::no_retry();
                    match self
                        .invoke(&fallback, request, settings, &single, attempts)
                        .await
                    {
                        Ok(completion) => RouteState::Success {
                            provider: fallback.id,
                            completion,
                            fallback_used: true,
                        },
                        Err(fallback_error) => {
                            warn!(
                                primary = %primary,
                                fallback = %fallback.id,
                                kind = %fallback_error.kind,
                                "Fallback provider also failed"
                            );
                            failed(primary, &error)
                        }
                    }
                }

                RouteState::Success {
                    provider,
                    completion,
                    fallback_used,
                } => {
                    return RouteOutcome::Success {
                        provider,
                        completion,
                        fallback_used,
                    };
                }

                RouteState::Failure {
                    provider,
                    error,
                    latency_ms,
                    counted,
                } => {
                    return RouteOutcome::Failure {
                        provider,
                        error,
                        latency_ms,
                        counted,
                    };
                }
            };
        }
    }

    /// Calls one provider, retrying retryable errors per `retry`.
    async fn invoke(
        &self,
        provider: &ProviderConfig,
        request: &ChatRequest,
        settings: &Settings,
        retry: &RetryStrategy,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<Completion, UpstreamError> {
        let completion_request = CompletionRequest::resolve(request, provider, settings);
        let mut attempt = 1;

        loop {
            debug!(provider = %provider.id, attempt, "Invoking provider");
            match self.client.send(provider, &completion_request).await {
                Ok(completion) => {
                    attempts.push(AttemptRecord {
                        provider: provider.id.clone(),
                        attempt,
                        success: true,
                        error_kind: None,
                        latency_ms: completion.latency_ms,
                    });
                    info!(
                        provider = %provider.id,
                        attempt,
                        latency_ms = completion.latency_ms,
                        "Provider call succeeded"
                    );
                    return Ok(completion);
                }
                Err(error) => {
                    attempts.push(AttemptRecord {
                        provider: provider.id.clone(),
                        attempt,
                        success: false,
                        error_kind: Some(error.kind),
                        latency_ms: error.elapsed_ms,
                    });

                    if !retry.should_retry(attempt, &error) {
                        debug!(provider = %provider.id, attempt, kind = %error.kind, "Provider call failed");
                        return Err(error);
                    }

                    let delay = retry.delay_after(attempt, &error);
                    debug!(
                        provider = %provider.id,
                        attempt,
                        kind = %error.kind,
                        delay_ms = duration_ms(delay),
                        "Retrying provider"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Records the outcome in the ledger and builds the result.
    async fn account(
        &self,
        outcome: RouteOutcome,
        today: NaiveDate,
        attempts: Vec<AttemptRecord>,
    ) -> ChatResult {
        match outcome {
            RouteOutcome::Success {
                provider,
                completion,
                fallback_used,
            } => {
                self.ledger
                    .record(&provider, today, completion.tokens_in, completion.tokens_out)
                    .await;
                ChatResult::success(provider, completion, fallback_used, attempts)
            }
            RouteOutcome::Failure {
                provider,
                error,
                latency_ms,
                counted,
            } => {
                if counted {
                    self.ledger.record_error(&provider, today).await;
                }
                info!(provider = %provider, kind = %error.kind, "Chat request failed");
                ChatResult::failure(provider, error, latency_ms, attempts)
            }
        }
    }
}

impl std::fmt::Debug for ChatRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRouter").finish_non_exhaustive()
    }
}

// ============================================================================
// Transitions
// ============================================================================

fn resolve(snapshot: &RegistryFile, request: &ChatRequest) -> RouteState {
    let id = request
        .provider_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(snapshot.settings.default_provider.as_str());

    match snapshot.providers.iter().find(|p| p.id == id) {
        Some(provider) if provider.enabled => RouteState::Invoke {
            primary: provider.clone(),
        },
        found => {
            let reason = if found.is_some() { "is disabled" } else { "does not exist" };
            debug!(provider = %id, reason, "Provider not resolved");
            RouteState::Failure {
                provider: id.to_string(),
                error: ChatError {
                    kind: ErrorKind::ProviderNotFound,
                    message: format!("Provider '{id}' {reason}"),
                    status: None,
                },
                latency_ms: 0,
                counted: false,
            }
        }
    }
}

/// Returns the provider to fall back to after `primary` failed, if one is
/// configured, distinct from `primary`, present and enabled.
fn fallback_target(snapshot: &RegistryFile, primary: &str) -> Option<ProviderConfig> {
    let id = snapshot.settings.fallback_for(primary)?;
    let provider = snapshot.providers.iter().find(|p| p.id == id);
    match provider {
        Some(p) if p.enabled => Some(p.clone()),
        _ => {
            warn!(primary = %primary, fallback = %id, "Fallback provider unavailable");
            None
        }
    }
}

fn failed(primary: String, error: &UpstreamError) -> RouteState {
    RouteState::Failure {
        provider: primary,
        error: error.to_chat_error(),
        latency_ms: error.elapsed_ms,
        counted: true,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llmgate_core::{DateRange, ProviderFamily, ProviderPatch, SettingsPatch};
    use llmgate_upstream::Exchange;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use url::Url;

    /// Upstream whose answers are scripted per provider id.
    #[derive(Default)]
    struct ScriptedUpstream {
        scripts: Mutex<HashMap<String, VecDeque<Result<Completion, UpstreamError>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedUpstream {
        fn push(&self, provider: &str, outcome: Result<Completion, UpstreamError>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(provider.to_string())
                .or_default()
                .push_back(outcome);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedUpstream {
        async fn exchange(&self, _provider: &ProviderConfig, _request: &CompletionRequest) -> Exchange {
            unreachable!("router only uses send")
        }

        async fn send(
            &self,
            provider: &ProviderConfig,
            _request: &CompletionRequest,
        ) -> Result<Completion, UpstreamError> {
            self.calls.lock().unwrap().push(provider.id.clone());
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&provider.id)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(UpstreamError::new(ErrorKind::Unreachable, "no script")))
        }
    }

    fn ok(text: &str) -> Result<Completion, UpstreamError> {
        Ok(Completion {
            text: text.to_string(),
            tokens_in: 3,
            tokens_out: 4,
            latency_ms: 12,
            model: "m1".to_string(),
        })
    }

    fn err(kind: ErrorKind) -> Result<Completion, UpstreamError> {
        Err(UpstreamError::new(kind, kind.as_str()).with_elapsed(5))
    }

    fn provider(id: &str) -> ProviderConfig {
        ProviderConfig::new(id, id.to_uppercase(), "m1", Url::parse("http://127.0.0.1:9/v1").unwrap())
            .with_family(ProviderFamily::Local)
            .with_enabled(true)
    }

    struct Harness {
        _dir: TempDir,
        registry: Arc<Registry>,
        ledger: Arc<UsageLedger>,
        upstream: Arc<ScriptedUpstream>,
        router: ChatRouter,
    }

    async fn setup(fallback: Option<&str>, retry_attempts: u32) -> Harness {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            default_provider: "a".to_string(),
            fallback_provider: fallback.map(str::to_string),
            retry_attempts,
            ..Settings::default()
        };
        let file = RegistryFile {
            settings,
            providers: vec![provider("a"), provider("b"), provider("c").with_enabled(false)],
        };
        let registry = Arc::new(Registry::create(dir.path().join("providers.json"), file).await.unwrap());
        let ledger = Arc::new(UsageLedger::new(dir.path().join("usage.json")));
        let upstream = Arc::new(ScriptedUpstream::default());
        let router = ChatRouter::new(registry.clone(), upstream.clone(), ledger.clone());
        Harness {
            _dir: dir,
            registry,
            ledger,
            upstream,
            router,
        }
    }

    async fn today_usage(h: &Harness, provider: &str) -> llmgate_core::UsageTotals {
        let today = Utc::now().date_naive();
        h.ledger.query(DateRange::single(today), Some(provider)).await.totals
    }

    #[tokio::test]
    async fn test_default_provider_success() {
        let h = setup(Some("b"), 0).await;
        h.upstream.push("a", ok("hello"));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert!(result.is_success());
        assert_eq!(result.text, "hello");
        assert_eq!(result.provider_used, "a");
        assert!(!result.fallback_used);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(today_usage(&h, "a").await.request_count, 1);
        assert_eq!(today_usage(&h, "a").await.token_count, 7);
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let h = setup(Some("b"), 0).await;
        h.upstream.push("a", err(ErrorKind::ServerError));
        h.upstream.push("b", ok("from b"));

        let result = h.router.route(ChatRequest::new("hi").with_provider("a")).await;

        assert!(result.is_success());
        assert!(result.fallback_used);
        assert_eq!(result.provider_used, "b");
        assert_eq!(h.upstream.calls(), vec!["a", "b"]);
        assert_eq!(today_usage(&h, "b").await.request_count, 1);
        assert_eq!(today_usage(&h, "a").await.request_count, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_falls_back_without_retry() {
        let h = setup(Some("b"), 3).await;
        h.upstream.push("a", err(ErrorKind::AuthFailure));
        h.upstream.push("b", ok("ok"));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert!(result.fallback_used);
        assert_eq!(h.upstream.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_total_failure_reports_primary_error() {
        let h = setup(Some("b"), 0).await;
        h.upstream.push("a", err(ErrorKind::Timeout));
        h.upstream.push("b", err(ErrorKind::AuthFailure));

        let result = h.router.route(ChatRequest::new("hi").with_provider("a")).await;

        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(result.provider_used, "a");
        assert!(!result.fallback_used);
        assert_eq!(result.attempts.len(), 2);

        let usage = today_usage(&h, "a").await;
        assert_eq!(usage.request_count, 1);
        assert_eq!(usage.error_count, 1);
        assert_eq!(today_usage(&h, "b").await.request_count, 0);
    }

    #[tokio::test]
    async fn test_never_chains_past_one_fallback() {
        let h = setup(Some("b"), 0).await;
        h.upstream.push("a", err(ErrorKind::ServerError));
        h.upstream.push("b", err(ErrorKind::ServerError));
        h.upstream.push("b", ok("unused"));

        h.router.route(ChatRequest::new("hi")).await;

        assert_eq!(h.upstream.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_no_fallback_when_disabled_in_settings() {
        let h = setup(Some("b"), 0).await;
        let patch = SettingsPatch {
            auto_fallback: Some(false),
            ..Default::default()
        };
        h.registry.update_settings(&patch).await.unwrap();
        h.upstream.push("a", err(ErrorKind::RateLimited));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::RateLimited));
        assert_eq!(h.upstream.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_fallback_equal_to_primary_is_skipped() {
        let h = setup(Some("a"), 0).await;
        h.upstream.push("a", err(ErrorKind::ServerError));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::ServerError));
        assert_eq!(h.upstream.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_disabled_fallback_is_skipped() {
        let h = setup(Some("b"), 0).await;
        let patch = ProviderPatch {
            enabled: Some(false),
            ..Default::default()
        };
        h.registry.update("b", &patch).await.unwrap();
        h.upstream.push("a", err(ErrorKind::ServerError));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert_eq!(result.provider_used, "a");
        assert_eq!(h.upstream.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unknown_or_disabled_provider_not_found() {
        let h = setup(Some("b"), 0).await;

        for id in ["missing", "c"] {
            let result = h.router.route(ChatRequest::new("hi").with_provider(id)).await;
            assert_eq!(result.error_kind(), Some(ErrorKind::ProviderNotFound));
            assert_eq!(result.provider_used, id);
            assert!(result.attempts.is_empty());
        }

        assert!(h.upstream.calls().is_empty());
        let today = Utc::now().date_naive();
        let summary = h.ledger.query(DateRange::single(today), None).await;
        assert_eq!(summary.totals.request_count, 0);
    }

    #[tokio::test]
    async fn test_retryable_error_is_retried_before_fallback() {
        let h = setup(Some("b"), 2).await;
        h.upstream.push("a", err(ErrorKind::ServerError));
        h.upstream.push("a", ok("second try"));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert_eq!(result.text, "second try");
        assert!(!result.fallback_used);
        assert_eq!(h.upstream.calls(), vec!["a", "a"]);
        assert_eq!(result.attempts[0].error_kind, Some(ErrorKind::ServerError));
        assert_eq!(result.attempts[1].attempt, 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_then_fallback() {
        let h = setup(Some("b"), 1).await;
        h.upstream.push("a", err(ErrorKind::Unreachable));
        h.upstream.push("a", err(ErrorKind::Unreachable));
        h.upstream.push("b", ok("fallback"));

        let result = h.router.route(ChatRequest::new("hi")).await;

        assert!(result.fallback_used);
        assert_eq!(h.upstream.calls(), vec!["a", "a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_requests_each_counted_once() {
        let h = setup(None, 0).await;
        for _ in 0..50 {
            h.upstream.push("a", ok("x"));
        }
        let router = Arc::new(h.router);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move { router.route(ChatRequest::new("hi")).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            assert!(task.unwrap().is_success());
        }

        let today = Utc::now().date_naive();
        let usage = h.ledger.query(DateRange::single(today), Some("a")).await;
        assert_eq!(usage.totals.request_count, 50);
    }
}
