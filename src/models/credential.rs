//! Stored OAuth credential for a linked Tuya account.

use serde::{Deserialize, Serialize};

/// One linked Tuya account's OAuth credential.
///
/// Exactly one live credential exists per uid; a refresh mutates it in
/// place rather than inserting a second record. All timestamps are
/// milliseconds since the Unix epoch so `expires_at` compares directly
/// against the current wall clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Opaque Tuya user id identifying the linked account
    pub uid: String,
    /// Short-lived bearer token for API calls
    pub access_token: String,
    /// Longer-lived token used to mint a new access token
    pub refresh_token: String,
    /// Absolute expiry of the access token (ms since epoch)
    pub expires_at: i64,
    /// When the account was first linked (ms since epoch)
    pub created_at: i64,
    /// Last mutation time (ms since epoch)
    pub updated_at: i64,
}

impl StoredCredential {
    /// Whether the access token is still comfortably valid at `now_ms`,
    /// given a refresh buffer in milliseconds.
    pub fn is_fresh(&self, now_ms: i64, buffer_ms: i64) -> bool {
        self.expires_at - buffer_ms > now_ms
    }
}
