//! HTTP API.
//!
//! JSON in, JSON out. Upstream failures are data: `/api/chat` and
//! `/api/providers/{id}/test` answer 200 whenever the request itself was
//! well-formed.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{NaiveDate, Utc};
use llmgate_core::{
    ChatRequest, ChatResult, DateRange, ProviderConfig, ProviderPatch, RedactedProvider, Settings,
    SettingsPatch, UsageSummary,
};
use llmgate_store::SecretsStatus;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::GatewayError;
use crate::harness::{TestRequest, TestResult};
use crate::state::Gateway;

/// Days covered by a usage query without explicit bounds.
pub const DEFAULT_USAGE_DAYS: u64 = 7;

/// Builds the axum router for the gateway API.
pub fn router(state: Gateway) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/providers", get(list_providers))
        .route("/api/providers/{id}", put(update_provider))
        .route("/api/providers/{id}/test", post(test_provider))
        .route("/api/chat", post(chat))
        .route("/api/usage", get(usage))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/env/private", get(secrets_status))
        .route("/api/env/private/refresh", post(refresh_secrets))
        .route("/api/env/private/clear", post(clear_secrets))
        .with_state(state)
}

// ============================================================================
// Bodies
// ============================================================================

/// Parses a JSON body, mapping any failure to a 400.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Validation(format!("invalid body: {e}")))
}

/// Like [`parse_body`], but an empty body gives the default value.
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

/// Providers keyed by id, in registry order.
struct ProviderMap(Vec<RedactedProvider>);

impl ProviderMap {
    fn new(providers: &[ProviderConfig]) -> Self {
        Self(providers.iter().map(RedactedProvider::from).collect())
    }
}

impl Serialize for ProviderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for provider in &self.0 {
            map.serialize_entry(&provider.id, provider)?;
        }
        map.end()
    }
}

/// Query string of `GET /api/usage`.
#[derive(Debug, Default, Deserialize)]
struct UsageQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    provider: Option<String>,
}

impl UsageQuery {
    fn range(&self, today: NaiveDate) -> Result<DateRange, GatewayError> {
        Ok(DateRange::from_bounds(self.from, self.to, today, DEFAULT_USAGE_DAYS)?)
    }
}

#[derive(Serialize)]
struct SyncResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    providers: Option<Vec<String>>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_providers(State(state): State<Gateway>) -> Json<ProviderMap> {
    let providers = state.registry.list().await;
    Json(ProviderMap::new(&providers))
}

async fn update_provider(
    State(state): State<Gateway>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<RedactedProvider>, GatewayError> {
    let patch: ProviderPatch = parse_body(&body)?;
    Ok(Json(state.update_provider(&id, &patch).await?))
}

async fn test_provider(
    State(state): State<Gateway>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<TestResult>, GatewayError> {
    let request: TestRequest = parse_optional_body(&body)?;
    Ok(Json(state.harness.test(&id, &request).await?))
}

async fn chat(State(state): State<Gateway>, body: Bytes) -> Result<Json<ChatResult>, GatewayError> {
    let request: ChatRequest = parse_body(&body)?;
    request.validate()?;

    // Runs detached: if the client goes away, the upstream call and its
    // usage accounting still complete and only the result is dropped.
    let router = state.router.clone();
    let result = tokio::spawn(async move { router.route(request).await })
        .await
        .map_err(|e| GatewayError::Internal(format!("chat task failed: {e}")))?;

    debug!(provider = %result.provider_used, success = result.is_success(), "Chat answered");
    Ok(Json(result))
}

async fn usage(
    State(state): State<Gateway>,
    query: Result<Query<UsageQuery>, QueryRejection>,
) -> Result<Json<UsageSummary>, GatewayError> {
    let Query(query) = query.map_err(|e| GatewayError::Validation(e.body_text()))?;
    let range = query.range(Utc::now().date_naive())?;
    let provider = query.provider.as_deref().filter(|p| !p.is_empty());
    Ok(Json(state.ledger.query(range, provider).await))
}

async fn get_settings(State(state): State<Gateway>) -> Json<Settings> {
    Json(state.registry.settings().await)
}

async fn update_settings(
    State(state): State<Gateway>,
    body: Bytes,
) -> Result<Json<Settings>, GatewayError> {
    let patch: SettingsPatch = parse_body(&body)?;
    Ok(Json(state.update_settings(&patch).await?))
}

async fn secrets_status(State(state): State<Gateway>) -> Result<Json<SecretsStatus>, GatewayError> {
    Ok(Json(state.sync.status().await?))
}

async fn refresh_secrets(State(state): State<Gateway>) -> Result<Json<SyncResponse>, GatewayError> {
    let snapshot = state.sync.refresh().await.map_err(GatewayError::Storage)?;
    Ok(Json(SyncResponse {
        success: true,
        providers: Some(snapshot.provider_ids()),
    }))
}

async fn clear_secrets(State(state): State<Gateway>) -> Result<Json<SyncResponse>, GatewayError> {
    state.sync.clear().await.map_err(GatewayError::Storage)?;
    Ok(Json(SyncResponse {
        success: true,
        providers: None,
    }))
}
