// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device and telemetry types exchanged with the Tuya Cloud API and the
//! mobile app. Field names on the wire stay camelCase to match the app.

use serde::{Deserialize, Serialize};

/// A device as listed under a linked account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub category: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One raw data point from a device status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDatum {
    pub code: String,
    pub value: serde_json::Value,
}

/// Simplified switch state plus the raw data points it was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchStatus {
    pub on: bool,
    pub raw: Vec<StatusDatum>,
}

/// Where an energy snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergySource {
    /// Derived from real telemetry data points
    Real,
    /// Device exposes no telemetry codes; values are simulated
    Simulated,
}

/// Instantaneous power/voltage/current reading for a device.
///
/// Derived on every request, never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergySnapshot {
    pub power_w: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    /// Snapshot time (ms since epoch)
    pub ts: i64,
    pub source: EnergySource,
}
