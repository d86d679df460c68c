// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tuya Cloud API client and account service.
//!
//! Handles:
//! - Signed request execution against the regional OpenAPI endpoint
//! - OAuth authorization-code exchange and access token refresh
//! - Device listing, switch status, energy snapshots, device commands
//!
//! The low-level [`TuyaClient`] executes exactly one signed call and never
//! retries; the [`TuyaService`] layered on top owns the token lifecycle and
//! the refresh-race recovery.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Device, EnergySnapshot, EnergySource, StatusDatum, StoredCredential, SwitchStatus};
use crate::services::signing::{self, SignatureInput};
use crate::store::{CredentialStore, CredentialUpdate};
use anyhow::anyhow;
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiry when we proactively refresh.
const TOKEN_EXPIRY_BUFFER_MS: i64 = 60_000;

/// Switch data point codes, in preference order.
const SWITCH_CODES: [&str; 3] = ["switch_1", "switch", "switch_led"];

/// Per-uid mutexes serializing token refresh within this process.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

// ─────────────────────────────────────────────────────────────────────────────
// TuyaClient - one signed HTTP call at a time
// ─────────────────────────────────────────────────────────────────────────────

/// Low-level signed HTTP client for the Tuya OpenAPI.
#[derive(Clone)]
pub struct TuyaClient {
    http: reqwest::Client,
    config: Config,
}

impl TuyaClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Execute one signed request and unwrap the response envelope.
    ///
    /// Absent query values are omitted from both the URL and the signature;
    /// an absent body signs as the empty string. No retries happen here:
    /// expired-token recovery belongs to [`TuyaService`], and domain-level
    /// upstream errors propagate immediately.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, Option<String>)],
        body: Option<&serde_json::Value>,
        access_token: Option<&str>,
    ) -> Result<T, AppError> {
        let query_string = signing::build_query_string(query);
        let path_with_query = format!("{}{}", path, query_string);
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            path_with_query
        );

        let body_string = match body {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| AppError::Internal(anyhow!("Failed to serialize body: {}", e)))?,
            None => String::new(),
        };

        let timestamp = Utc::now().timestamp_millis().to_string();
        let nonce = signing::nonce();
        let sign = signing::sign(
            &self.config.client_id,
            &self.config.client_secret,
            &SignatureInput {
                method: method.as_str(),
                path_with_query: &path_with_query,
                body: &body_string,
                access_token: access_token.unwrap_or(""),
                timestamp: &timestamp,
                nonce: &nonce,
            },
        );

        let mut request = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("client_id", &self.config.client_id)
            .header("sign", sign)
            .header("sign_method", "HMAC-SHA256")
            .header("t", &timestamp)
            .header("nonce", &nonce)
            .header("lang", "en");

        if let Some(token) = access_token {
            request = request.header("access_token", token);
        }
        if let Some(auth_key) = &self.config.auth_key {
            request = request.header("Security-AuthKey", auth_key);
        }
        if !body_string.is_empty() {
            request = request.body(body_string);
        }

        let response = request.send().await.map_err(|e| AppError::Network {
            status: 0,
            body: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::Network {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| AppError::Internal(anyhow!("Invalid JSON from Tuya: {}", e)))?;

        let success = envelope
            .get("success")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if !success {
            let msg = envelope
                .get("msg")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Tuya API error")
                .to_string();
            let code = envelope.get("code").and_then(serde_json::Value::as_i64);
            return Err(AppError::Api {
                msg,
                code,
                detail: Some(envelope),
            });
        }

        let result = envelope
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        serde_json::from_value(result)
            .map_err(|e| AppError::Internal(anyhow!("Failed to parse Tuya result: {}", e)))
    }
}

/// Authorization-code exchange result from `/v1.0/token`.
#[derive(Debug, Clone, Deserialize)]
struct ExchangeCodeResponse {
    access_token: String,
    refresh_token: String,
    /// Validity in seconds, relative to now
    expire_time: i64,
    uid: String,
}

/// Token refresh result from `/v1.0/token/{refresh_token}`.
#[derive(Debug, Clone, Deserialize)]
struct RefreshTokenResponse {
    access_token: String,
    refresh_token: String,
    expire_time: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// TuyaService - token lifecycle and domain operations
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Tuya service owning the token lifecycle and device operations.
///
/// Per-uid refresh serialization uses the shared `refresh_locks` map; the
/// credential store is pluggable so the volatile in-memory backing can be
/// swapped for a persistent one.
#[derive(Clone)]
pub struct TuyaService {
    client: TuyaClient,
    config: Config,
    store: Arc<dyn CredentialStore>,
    refresh_locks: RefreshLocks,
}

impl TuyaService {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client: TuyaClient::new(config.clone()),
            config,
            store,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Token Lifecycle ─────────────────────────────────────────────────────

    /// Exchange an OAuth authorization code for tokens and persist the
    /// resulting credential.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredCredential, AppError> {
        let result: ExchangeCodeResponse = self
            .client
            .request(
                Method::POST,
                "/v1.0/token",
                &[("grant_type", Some("1".to_string()))],
                Some(&serde_json::json!({
                    "code": code,
                    "redirect_uri": self.config.callback_url,
                })),
                None,
            )
            .await?;

        let now = Utc::now().timestamp_millis();
        let credential = StoredCredential {
            uid: result.uid,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            expires_at: now + result.expire_time * 1000,
            created_at: now,
            updated_at: now,
        };

        self.store.set(credential.clone()).await;
        tracing::info!(uid = %credential.uid, "Tuya account linked");
        Ok(credential)
    }

    /// Get a currently-valid access token for a linked account, refreshing
    /// it when within the expiry buffer.
    ///
    /// Refresh is serialized per uid within this process; a refresh that
    /// fails with an upstream error is retried exactly once after
    /// re-fetching the credential, which recovers from another process
    /// having rotated the refresh token first.
    pub async fn get_valid_access_token(&self, uid: &str) -> Result<String, AppError> {
        let credential = self.require_credential(uid).await?;
        if credential.is_fresh(Utc::now().timestamp_millis(), TOKEN_EXPIRY_BUFFER_MS) {
            return Ok(credential.access_token);
        }

        let lock = self
            .refresh_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: another task may have
        // refreshed while we were waiting.
        let credential = self.require_credential(uid).await?;
        if credential.is_fresh(Utc::now().timestamp_millis(), TOKEN_EXPIRY_BUFFER_MS) {
            return Ok(credential.access_token);
        }

        tracing::info!(uid, "Access token near expiry, refreshing");

        match self.refresh(uid, &credential.refresh_token).await {
            Ok(token) => Ok(token),
            Err(AppError::Api { msg, .. }) => {
                // The upstream rotates refresh tokens; losing a refresh race
                // to another process leaves ours stale. Re-fetch and retry
                // once with whatever the store holds now.
                tracing::warn!(
                    uid,
                    error = %msg,
                    "Token refresh rejected, re-fetching credential and retrying once"
                );
                let current = self.require_credential(uid).await?;
                if current.is_fresh(Utc::now().timestamp_millis(), TOKEN_EXPIRY_BUFFER_MS) {
                    return Ok(current.access_token);
                }
                self.refresh(uid, &current.refresh_token).await
            }
            Err(e) => Err(e),
        }
    }

    /// Call the refresh endpoint and persist the rotated tokens.
    async fn refresh(&self, uid: &str, refresh_token: &str) -> Result<String, AppError> {
        // The refresh endpoint is keyed by the refresh token in the path
        // and signs on the unauthenticated path (no access token).
        let result: RefreshTokenResponse = self
            .client
            .request(
                Method::GET,
                &format!("/v1.0/token/{}", refresh_token),
                &[("grant_type", Some("2".to_string()))],
                None,
                None,
            )
            .await?;

        let updated = self
            .store
            .update(
                uid,
                CredentialUpdate {
                    access_token: Some(result.access_token),
                    refresh_token: Some(result.refresh_token),
                    expires_at: Some(Utc::now().timestamp_millis() + result.expire_time * 1000),
                },
            )
            .await?;

        tracing::info!(uid, expires_at = updated.expires_at, "Access token refreshed");
        Ok(updated.access_token)
    }

    async fn require_credential(&self, uid: &str) -> Result<StoredCredential, AppError> {
        self.store
            .get(uid)
            .await
            .ok_or_else(|| AppError::NotFound(format!("No credential found for uid {}", uid)))
    }

    /// Resolve which linked account an operation targets.
    ///
    /// An explicit uid wins; otherwise the sole linked account is used.
    /// Zero linked accounts and multiple linked accounts are distinct
    /// failures so the caller can tell "link first" from "disambiguate".
    pub async fn resolve_account(&self, requested: Option<String>) -> Result<String, AppError> {
        if let Some(uid) = requested {
            return Ok(uid);
        }

        let mut entries = self.store.list().await;
        match entries.len() {
            0 => Err(AppError::NoLinkedAccount),
            1 => Ok(entries.remove(0).uid),
            _ => Err(AppError::AmbiguousAccount),
        }
    }

    /// Build the Tuya authorization redirect URL for starting the OAuth flow.
    pub fn build_auth_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}/v1.0/login/auth?client_id={}&response_type=code&redirect_uri={}&lang=en&scope=all",
            self.config.base_url.trim_end_matches('/'),
            self.config.client_id,
            urlencoding::encode(&self.config.callback_url),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    // ─── Domain Operations ───────────────────────────────────────────────────

    /// List the devices linked to an account.
    pub async fn list_devices(&self, uid: &str) -> Result<Vec<Device>, AppError> {
        let token = self.get_valid_access_token(uid).await?;
        self.client
            .request(
                Method::GET,
                &format!("/v1.0/users/{}/devices", uid),
                &[],
                None,
                Some(&token),
            )
            .await
    }

    /// Get a device's switch state plus its raw data points.
    pub async fn get_status(&self, device_id: &str, uid: &str) -> Result<SwitchStatus, AppError> {
        let raw = self.fetch_status(device_id, uid).await?;
        Ok(SwitchStatus {
            on: pick_switch(&raw),
            raw,
        })
    }

    /// Get an instantaneous energy snapshot for a device, simulating one
    /// when the device exposes no telemetry codes.
    pub async fn get_energy(&self, device_id: &str, uid: &str) -> Result<EnergySnapshot, AppError> {
        let raw = self.fetch_status(device_id, uid).await?;
        Ok(derive_energy(&raw))
    }

    /// Send a single command to a device. `code` defaults to `switch`.
    pub async fn send_command(
        &self,
        device_id: &str,
        uid: &str,
        code: Option<String>,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let token = self.get_valid_access_token(uid).await?;
        let code = code.unwrap_or_else(|| "switch".to_string());

        self.client
            .request(
                Method::POST,
                &format!("/v1.0/devices/{}/commands", device_id),
                &[],
                Some(&serde_json::json!({
                    "commands": [{ "code": code, "value": value }],
                })),
                Some(&token),
            )
            .await
    }

    async fn fetch_status(&self, device_id: &str, uid: &str) -> Result<Vec<StatusDatum>, AppError> {
        let token = self.get_valid_access_token(uid).await?;
        self.client
            .request(
                Method::GET,
                &format!("/v1.0/devices/{}/status", device_id),
                &[],
                None,
                Some(&token),
            )
            .await
    }
}

// ─── Telemetry derivation ────────────────────────────────────────────────────

/// Switch state from raw data points, honoring the code preference order.
fn pick_switch(raw: &[StatusDatum]) -> bool {
    for code in SWITCH_CODES {
        if let Some(datum) = raw.iter().find(|d| d.code == code) {
            return datum_truthy(&datum.value);
        }
    }
    false
}

/// Whether a data point value counts as "on".
fn datum_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => matches!(s.as_str(), "true" | "on" | "1"),
        _ => false,
    }
}

/// Numeric value of a data point; Tuya reports some meters as strings.
fn datum_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Derive an energy snapshot from raw status data points.
///
/// With no power/current code and no voltage code present the device does
/// not meter itself, so a simulated snapshot is returned instead.
fn derive_energy(raw: &[StatusDatum]) -> EnergySnapshot {
    let power = raw
        .iter()
        .find(|d| d.code == "cur_current" || d.code == "cur_power");
    let voltage = raw.iter().find(|d| d.code == "cur_voltage");

    if power.is_none() && voltage.is_none() {
        return simulated_snapshot();
    }

    let power_w = power.and_then(|d| datum_number(&d.value)).unwrap_or(0.0);
    let voltage_v = voltage.and_then(|d| datum_number(&d.value)).unwrap_or(120.0);
    let current_a = if voltage_v == 0.0 {
        0.0
    } else {
        round2(power_w / voltage_v)
    };

    EnergySnapshot {
        power_w,
        voltage_v,
        current_a,
        ts: Utc::now().timestamp_millis(),
        source: EnergySource::Real,
    }
}

/// Plausible household plug reading for devices without real telemetry.
fn simulated_snapshot() -> EnergySnapshot {
    let mut rng = rand::thread_rng();
    let power_w = round2(rng.gen_range(5.0..125.0));
    let voltage_v = round2(rng.gen_range(110.0..115.0));
    let current_a = round2(power_w / voltage_v);

    EnergySnapshot {
        power_w,
        voltage_v,
        current_a,
        ts: Utc::now().timestamp_millis(),
        source: EnergySource::Simulated,
    }
}
