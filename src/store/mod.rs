// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage layer.
//!
//! The store is an abstract capability so the volatile in-process map can
//! be swapped for a persistent backend (MySQL, Redis, ...) without
//! touching the token lifecycle code. `update` must be atomic per key;
//! that is the only concurrency guarantee callers rely on.

use crate::error::AppError;
use crate::models::StoredCredential;
use async_trait::async_trait;
use dashmap::DashMap;

/// Partial update applied to a stored credential on token refresh.
///
/// `uid` and `created_at` are never touched; `updated_at` is bumped by the
/// store itself.
#[derive(Debug, Default, Clone)]
pub struct CredentialUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

/// Keyed store of per-account OAuth credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for a uid, if one exists.
    async fn get(&self, uid: &str) -> Option<StoredCredential>;

    /// Insert or fully replace the credential for its uid.
    async fn set(&self, credential: StoredCredential);

    /// Apply a partial update, bumping `updated_at` to now.
    ///
    /// Fails with [`AppError::NotFound`] when the uid is unknown.
    async fn update(
        &self,
        uid: &str,
        updates: CredentialUpdate,
    ) -> Result<StoredCredential, AppError>;

    /// Remove the credential for a uid (account unlinking).
    async fn delete(&self, uid: &str);

    /// All stored credentials, in no particular order.
    async fn list(&self) -> Vec<StoredCredential>;
}

/// In-memory credential store.
///
/// Single-process and volatile: linked accounts disappear on restart.
/// Good enough for the demo deployment; production swaps in a persistent
/// implementation of [`CredentialStore`].
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, uid: &str) -> Option<StoredCredential> {
        self.entries.get(uid).map(|entry| entry.clone())
    }

    async fn set(&self, credential: StoredCredential) {
        self.entries.insert(credential.uid.clone(), credential);
    }

    async fn update(
        &self,
        uid: &str,
        updates: CredentialUpdate,
    ) -> Result<StoredCredential, AppError> {
        // get_mut holds the shard lock for the key, making the
        // read-modify-write atomic per uid.
        let mut entry = self
            .entries
            .get_mut(uid)
            .ok_or_else(|| AppError::NotFound(format!("No credential found for uid {}", uid)))?;

        if let Some(access_token) = updates.access_token {
            entry.access_token = access_token;
        }
        if let Some(refresh_token) = updates.refresh_token {
            entry.refresh_token = refresh_token;
        }
        if let Some(expires_at) = updates.expires_at {
            entry.expires_at = expires_at;
        }
        entry.updated_at = chrono::Utc::now().timestamp_millis();

        Ok(entry.clone())
    }

    async fn delete(&self, uid: &str) {
        self.entries.remove(uid);
    }

    async fn list(&self) -> Vec<StoredCredential> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
