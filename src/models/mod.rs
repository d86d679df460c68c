// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod credential;
pub mod device;

pub use credential::StoredCredential;
pub use device::{Device, EnergySnapshot, EnergySource, StatusDatum, SwitchStatus};
