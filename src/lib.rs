// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tuya-Bridge: link a Tuya Cloud account, list devices, toggle switches,
//! and read power/voltage/current snapshots.
//!
//! This crate provides the backend API the mobile app talks to. The core
//! is the signed-request client for the Tuya OpenAPI and the OAuth token
//! lifecycle built on top of it.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use config::Config;
use services::TuyaService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tuya: TuyaService,
}
