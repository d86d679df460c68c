// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle tests against a stub upstream.

use serde_json::json;
use tuya_bridge::store::CredentialStore;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_fresh_token_skips_refresh() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    store
        .set(common::credential("u1", "A", "R", 3_600_000))
        .await;

    // Any refresh call would hit this and fail the expect(0) below
    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "access_token": "A2", "refresh_token": "R2", "expire_time": 7200,
        }))))
        .expect(0)
        .mount(&server)
        .await;

    let token = service.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token, "A");
}

#[tokio::test]
async fn test_near_expiry_refreshes_exactly_once() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    // Inside the 60s buffer, so the first call must refresh
    store.set(common::credential("u1", "A", "R", 30_000)).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .and(query_param("grant_type", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "access_token": "A2", "refresh_token": "R2", "expire_time": 7200,
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let token = service.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token, "A2");

    // Store reflects the rotation
    let stored = store.get("u1").await.unwrap();
    assert_eq!(stored.access_token, "A2");
    assert_eq!(stored.refresh_token, "R2");
    assert!(stored.expires_at > common::now_ms() + 60_000);
    assert_eq!(stored.uid, "u1");

    // Second call rides the refreshed token; expect(1) above would trip
    // if another refresh went out
    let token = service.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token, "A2");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_refresh() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    store.set(common::credential("u1", "A", "R", 10_000)).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "access_token": "A2", "refresh_token": "R2", "expire_time": 7200,
        }))))
        .expect(1)
        .mount(&server)
        .await;

    // Both tasks observe near-expiry; the per-uid lock plus the re-check
    // after acquiring it collapse them into a single upstream refresh.
    let (a, b) = tokio::join!(
        service.get_valid_access_token("u1"),
        service.get_valid_access_token("u1"),
    );
    assert_eq!(a.unwrap(), "A2");
    assert_eq!(b.unwrap(), "A2");
}

#[tokio::test]
async fn test_refresh_failure_retries_once_after_refetch() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    store.set(common::credential("u1", "A", "R", 10_000)).await;

    // First attempt: the upstream rejects the (raced-away) refresh token
    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::err_envelope(1010, "token is invalid")),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    // Retry after re-fetch succeeds
    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "access_token": "A2", "refresh_token": "R2", "expire_time": 7200,
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let token = service.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token, "A2");
    assert_eq!(store.get("u1").await.unwrap().refresh_token, "R2");
}

#[tokio::test]
async fn test_refresh_failing_twice_surfaces_api_error() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    store.set(common::credential("u1", "A", "R", 10_000)).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::err_envelope(1010, "token is invalid")),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = service.get_valid_access_token("u1").await.unwrap_err();
    match err {
        tuya_bridge::error::AppError::Api { msg, code, .. } => {
            assert_eq!(msg, "token is invalid");
            assert_eq!(code, Some(1010));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upstream_http_error_is_network_error() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    store.set(common::credential("u1", "A", "R", 10_000)).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/R"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    // Transport-level failures are not retried
    let err = service.get_valid_access_token("u1").await.unwrap_err();
    match err {
        tuya_bridge::error::AppError::Network { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected Network error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exchange_code_persists_credential() {
    let server = MockServer::start().await;
    let (service, store) = common::create_test_service(&server.uri());

    Mock::given(method("POST"))
        .and(path("/v1.0/token"))
        .and(query_param("grant_type", "1"))
        .and(body_json(json!({
            "code": "auth-code-1",
            "redirect_uri": "https://backend.example/api/tuya/auth/callback",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "uid": "u1",
            "access_token": "A1",
            "refresh_token": "R1",
            "expire_time": 7200,
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let before = common::now_ms();
    let credential = service.exchange_code("auth-code-1").await.unwrap();

    assert_eq!(credential.uid, "u1");
    assert_eq!(credential.access_token, "A1");
    assert_eq!(credential.refresh_token, "R1");
    // expire_time is seconds-from-now; the stored expiry is absolute ms
    assert!(credential.expires_at >= before + 7_200_000);
    assert!(credential.expires_at <= common::now_ms() + 7_200_000);

    let stored = store.get("u1").await.unwrap();
    assert_eq!(stored.access_token, "A1");
}
