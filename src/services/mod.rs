// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod signing;
pub mod tuya;

pub use tuya::{TuyaClient, TuyaService};
