//! Shared fixtures: stub upstreams and a gateway on an ephemeral port.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use llmgate_gateway::{GatewayConfig, ServeHandle, serve};
use serde_json::{Value, json};
use tempfile::TempDir;

/// A stub provider answering every chat call with a fixed response.
pub struct StubUpstream {
    /// Base URL to configure on a provider (`.../v1`).
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl StubUpstream {
    /// Number of chat calls received.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a stub upstream on 127.0.0.1 with a random port.
pub async fn stub_upstream(status: u16, body: Value) -> StubUpstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let body = body.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (status, axum::Json(body)).into_response()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubUpstream {
        base_url: format!("http://127.0.0.1:{port}/v1"),
        hits,
    }
}

/// A successful OpenAI-shaped completion.
pub fn completion(text: &str) -> Value {
    json!({
        "model": "stub-model",
        "choices": [{"message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3},
    })
}

/// A running gateway with its own data directory.
pub struct TestGateway {
    pub dir: TempDir,
    pub handle: ServeHandle,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::new(dir.path())
            .with_bind("127.0.0.1:0")
            .with_request_timeout(std::time::Duration::from_secs(5));
        let handle = serve(&config).await.unwrap();
        Self {
            dir,
            handle,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.handle.base_url())
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn send(&self, method: reqwest::Method, path: &str, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::PUT, path, &body).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::POST, path, &body).await
    }

    /// Points `id` at `base_url`, enables it, and sets a credential.
    pub async fn configure(&self, id: &str, base_url: &str, credential: &str) {
        let (status, body) = self
            .put(
                &format!("/api/providers/{id}"),
                json!({"enabled": true, "baseURL": base_url, "credential": credential}),
            )
            .await;
        assert_eq!(status, 200, "configure {id}: {body}");
    }

    pub async fn secrets_text(&self) -> String {
        tokio::fs::read_to_string(self.dir.path().join(".env.private"))
            .await
            .unwrap()
    }
}
