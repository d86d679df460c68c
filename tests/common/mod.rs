// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: app/service factories pointed at a stub upstream.

use std::sync::Arc;
use tuya_bridge::config::Config;
use tuya_bridge::models::StoredCredential;
use tuya_bridge::services::TuyaService;
use tuya_bridge::store::MemoryCredentialStore;
use tuya_bridge::AppState;

/// Test config pointed at a stub upstream base URL.
#[allow(dead_code)]
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::test_default();
    config.base_url = base_url.to_string();
    config
}

/// Create a service backed by a fresh in-memory store.
/// Returns the service and the store for seeding/inspection.
#[allow(dead_code)]
pub fn create_test_service(base_url: &str) -> (TuyaService, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let service = TuyaService::new(test_config(base_url), store.clone());
    (service, store)
}

/// Create a test app (router + store handle) against a stub upstream.
#[allow(dead_code)]
pub fn create_test_app(base_url: &str) -> (axum::Router, Arc<MemoryCredentialStore>) {
    let config = test_config(base_url);
    let store = Arc::new(MemoryCredentialStore::new());
    let tuya = TuyaService::new(config.clone(), store.clone());
    let state = Arc::new(AppState { config, tuya });
    (tuya_bridge::routes::create_router(state), store)
}

#[allow(dead_code)]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A credential with the given expiry offset from now (ms).
#[allow(dead_code)]
pub fn credential(uid: &str, access: &str, refresh: &str, expires_in_ms: i64) -> StoredCredential {
    let now = now_ms();
    StoredCredential {
        uid: uid.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: now + expires_in_ms,
        created_at: now,
        updated_at: now,
    }
}

/// Successful Tuya envelope wrapping a result payload.
#[allow(dead_code)]
pub fn ok_envelope(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "result": result,
        "t": 1_700_000_000_000i64,
        "tid": "test-tid",
    })
}

/// Failure envelope with a vendor code and message.
#[allow(dead_code)]
pub fn err_envelope(code: i64, msg: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "result": null,
        "code": code,
        "msg": msg,
        "t": 1_700_000_000_000i64,
        "tid": "test-tid",
    })
}
