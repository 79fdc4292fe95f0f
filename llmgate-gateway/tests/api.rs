//! Provider, settings and secrets endpoints.

mod common;

use common::TestGateway;
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let gw = TestGateway::start().await;
    let (status, body) = gw.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_listing_is_seeded_and_ordered() {
    let gw = TestGateway::start().await;
    let (status, body) = gw.get("/api/providers").await;
    assert_eq!(status, 200);

    let ids: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(ids.len(), 6);
    assert_eq!(body["local-llm"]["enabled"], true);
    assert_eq!(body["openai"]["enabled"], false);
}

#[tokio::test]
async fn test_listing_never_contains_credentials() {
    let gw = TestGateway::start().await;
    let secrets = ["sk-live-0123456789", "gsk_another_secret", "ds-third"];
    for (id, secret) in ["openai", "groq", "deepseek"].iter().zip(secrets) {
        let (status, body) = gw
            .put(&format!("/api/providers/{id}"), json!({"credential": secret}))
            .await;
        assert_eq!(status, 200);
        assert!(!body.to_string().contains(secret));
        assert_eq!(body["hasCredential"], true);
    }

    let (_, body) = gw.get("/api/providers").await;
    let text = body.to_string();
    for secret in secrets {
        assert!(!text.contains(secret), "listing leaked {secret}");
    }
}

#[tokio::test]
async fn test_update_validation_and_not_found() {
    let gw = TestGateway::start().await;

    let (status, body) = gw
        .put("/api/providers/openai", json!({"baseURL": "not a url"}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = gw
        .put("/api/providers/openai", json!({"apiVersion": "2024"}))
        .await;
    assert_eq!(status, 400);

    let (status, body) = gw.put("/api/providers/ghost", json!({"enabled": true})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_update_reports_sync_failure_but_keeps_change() {
    let gw = TestGateway::start().await;
    let secrets = gw.dir.path().join(".env.private");
    if secrets.exists() {
        tokio::fs::remove_file(&secrets).await.unwrap();
    }
    tokio::fs::create_dir(&secrets).await.unwrap();
    tokio::fs::write(secrets.join("keep"), "x").await.unwrap();

    let (status, body) = gw
        .put(
            "/api/providers/openai",
            json!({"enabled": true, "credential": "sk-sync-failure"}),
        )
        .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "sync_failed");
    assert!(!body.to_string().contains("sk-sync-failure"));

    let (_, listing) = gw.get("/api/providers").await;
    assert_eq!(listing["openai"]["enabled"], true);
    assert_eq!(listing["openai"]["hasCredential"], true);
}

#[tokio::test]
async fn test_update_persists_across_restart() {
    let gw = TestGateway::start().await;
    gw.put("/api/providers/openrouter", json!({"model": "meta/llama-3"})).await;

    let TestGateway { dir, handle, .. } = gw;
    handle.shutdown().await.unwrap();

    let config = llmgate_gateway::GatewayConfig::new(dir.path()).with_bind("127.0.0.1:0");
    let handle = llmgate_gateway::serve(&config).await.unwrap();
    let body: serde_json::Value = reqwest::get(format!("{}/api/providers", handle.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["openrouter"]["model"], "meta/llama-3");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disabling_removes_credential_from_secrets() {
    let gw = TestGateway::start().await;
    gw.put(
        "/api/providers/openai",
        json!({"enabled": true, "credential": "sk-disable-me"}),
    )
    .await;
    assert!(gw.secrets_text().await.contains("OPENAI_API_KEY=sk-disable-me"));

    gw.put("/api/providers/openai", json!({"enabled": false})).await;
    let (status, body) = gw.post("/api/env/private/refresh", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    assert!(!gw.secrets_text().await.contains("sk-disable-me"));
}

#[tokio::test]
async fn test_secrets_status_has_no_values() {
    let gw = TestGateway::start().await;
    gw.put(
        "/api/providers/groq",
        json!({"enabled": true, "credential": "gsk-status"}),
    )
    .await;

    let (status, body) = gw.get("/api/env/private").await;
    assert_eq!(status, 200);
    assert_eq!(body["exists"], true);
    assert_eq!(body["providers"], json!(["groq"]));
    assert!(body["enabledProviders"].as_array().unwrap().contains(&json!("groq")));
    assert!(!body.to_string().contains("gsk-status"));
}

#[tokio::test]
async fn test_clear_then_refresh() {
    let gw = TestGateway::start().await;
    gw.put(
        "/api/providers/deepseek",
        json!({"enabled": true, "credential": "ds-clear"}),
    )
    .await;

    let (status, body) = gw.post("/api/env/private/clear", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(!gw.secrets_text().await.contains("ds-clear"));

    gw.post("/api/env/private/refresh", json!({})).await;
    assert!(gw.secrets_text().await.contains("ds-clear"));
}

#[tokio::test]
async fn test_settings_round_trip_and_validation() {
    let gw = TestGateway::start().await;

    let (status, settings) = gw.get("/api/settings").await;
    assert_eq!(status, 200);
    assert_eq!(settings["defaultProvider"], "local-llm");

    let (status, settings) = gw
        .put("/api/settings", json!({"temperature": 0.2, "fallbackProvider": "openai"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(settings["temperature"], 0.2);
    assert_eq!(settings["fallbackProvider"], "openai");

    let (status, _) = gw
        .put("/api/settings", json!({"defaultProvider": "ghost"}))
        .await;
    assert_eq!(status, 400);

    let (status, _) = gw.put("/api/settings", json!({"theme": "dark"})).await;
    assert_eq!(status, 400);

    let (_, settings) = gw.get("/api/settings").await;
    assert_eq!(settings["defaultProvider"], "local-llm");
}

#[tokio::test]
async fn test_usage_query_validation() {
    let gw = TestGateway::start().await;

    let (status, body) = gw.get("/api/usage").await;
    assert_eq!(status, 200);
    assert_eq!(body["totals"]["requestCount"], 0);

    let (status, _) = gw.get("/api/usage?from=2025-06-10&to=2025-06-01").await;
    assert_eq!(status, 400);

    let (status, _) = gw.get("/api/usage?from=yesterday").await;
    assert_eq!(status, 400);
}
