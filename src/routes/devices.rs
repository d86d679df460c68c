// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device routes: listing, switch status, energy snapshots, commands.
//!
//! Each handler resolves the target account from the `uid` query parameter
//! or the `x-tuya-uid` header, falling back to the sole linked account.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::EnergySource;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tuya/devices", get(list_devices))
        .route("/api/tuya/status/{device_id}", get(device_status))
        .route("/api/tuya/energy/{device_id}", get(device_energy))
        .route("/api/tuya/command/{device_id}", post(device_command))
}

#[derive(Deserialize)]
pub struct UidParams {
    uid: Option<String>,
}

/// Explicit uid from the query parameter or the `x-tuya-uid` header.
fn requested_uid(params: &UidParams, headers: &HeaderMap) -> Option<String> {
    params
        .uid
        .clone()
        .filter(|uid| !uid.is_empty())
        .or_else(|| {
            headers
                .get("x-tuya-uid")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        })
}

/// List devices for the resolved account.
async fn list_devices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UidParams>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let uid = state
        .tuya
        .resolve_account(requested_uid(&params, &headers))
        .await?;
    let devices = state.tuya.list_devices(&uid).await?;

    Ok(Json(json!({ "uid": uid, "devices": devices })))
}

/// Switch status for one device.
async fn device_status(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(params): Query<UidParams>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let uid = state
        .tuya
        .resolve_account(requested_uid(&params, &headers))
        .await?;
    let status = state.tuya.get_status(&device_id, &uid).await?;

    Ok(Json(json!({ "uid": uid, "deviceId": device_id, "status": status })))
}

/// Energy snapshot for one device. The `x-tuya-energy-source` response
/// header tells the app whether the values are real or simulated.
async fn device_energy(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(params): Query<UidParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let uid = state
        .tuya
        .resolve_account(requested_uid(&params, &headers))
        .await?;
    let energy = state.tuya.get_energy(&device_id, &uid).await?;
    let source = energy.source;

    let mut response =
        Json(json!({ "uid": uid, "deviceId": device_id, "energy": energy })).into_response();

    let source_value = match source {
        EnergySource::Real => "real",
        EnergySource::Simulated => "simulated",
    };
    response
        .headers_mut()
        .insert("x-tuya-energy-source", HeaderValue::from_static(source_value));
    if source == EnergySource::Simulated {
        response.headers_mut().insert(
            "x-tuya-energy-note",
            HeaderValue::from_static(
                "This device does not expose real-time energy metrics. Values are simulated.",
            ),
        );
    }

    Ok(response)
}

/// Command request body. Either a simplified `switch` toggle or an explicit
/// `value` (with optional data point `code`).
#[derive(Deserialize)]
pub struct CommandBody {
    switch: Option<String>,
    value: Option<serde_json::Value>,
    code: Option<String>,
}

/// Forward a command to one device.
async fn device_command(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(params): Query<UidParams>,
    headers: HeaderMap,
    Json(body): Json<CommandBody>,
) -> Result<Json<serde_json::Value>> {
    let uid = state
        .tuya
        .resolve_account(requested_uid(&params, &headers))
        .await?;

    // The simplified switch toggle maps onto a boolean value here, before
    // the command reaches the service layer.
    let value = body
        .value
        .or_else(|| match body.switch.as_deref() {
            Some("on") => Some(json!(true)),
            Some("off") => Some(json!(false)),
            _ => None,
        })
        .ok_or_else(|| {
            AppError::BadRequest(
                "Provide either switch ('on' | 'off') or value in the payload.".to_string(),
            )
        })?;

    state
        .tuya
        .send_command(&device_id, &uid, body.code, value)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
