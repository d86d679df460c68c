// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tuya Cloud request signing (HMAC-SHA256).
//!
//! The signature format is a fixed vendor contract: the upstream recomputes
//! it byte for byte, so the field order and the absence of delimiters in
//! the sign payload must not change. See `sign_payload` for the layout.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Everything that feeds the per-request signature.
#[derive(Debug, Clone, Copy)]
pub struct SignatureInput<'a> {
    /// Uppercase HTTP method ("GET", "POST", ...)
    pub method: &'a str,
    /// Request path including the query string (e.g. `/v1.0/token?grant_type=1`)
    pub path_with_query: &'a str,
    /// Serialized request body; empty string when there is no body
    pub body: &'a str,
    /// Bearer access token, or empty string on the unauthenticated path
    pub access_token: &'a str,
    /// Request timestamp, milliseconds since epoch, as a decimal string
    pub timestamp: &'a str,
    /// Fresh 32-hex-char nonce
    pub nonce: &'a str,
}

/// Hex SHA-256 of the body string. The empty body hashes the empty string.
pub fn content_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// The canonical string bound by the signature.
///
/// Layout: `METHOD\n{sha256(body)}\n{signed-headers}\n{path?query}` where
/// the signed-headers slot is always empty in this scheme.
pub fn string_to_sign(method: &str, path_with_query: &str, body: &str) -> String {
    format!("{}\n{}\n\n{}", method, content_hash(body), path_with_query)
}

/// Concatenation signed by the client secret. No delimiters.
fn sign_payload(client_id: &str, input: &SignatureInput<'_>) -> String {
    format!(
        "{}{}{}{}{}",
        client_id,
        input.access_token,
        input.timestamp,
        input.nonce,
        string_to_sign(input.method, input.path_with_query, input.body)
    )
}

/// Compute the request signature: uppercase hex HMAC-SHA256 keyed by the
/// client secret.
pub fn sign(client_id: &str, client_secret: &str, input: &SignatureInput<'_>) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail for SHA-256.
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(sign_payload(client_id, input).as_bytes());
    hex::encode(mac.finalize().into_bytes()).to_uppercase()
}

/// Fresh per-request nonce: 32 lowercase hex characters.
pub fn nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build a query string from key/value pairs, skipping absent values.
///
/// Returns either an empty string or `?k=v&...` with percent-encoded
/// values, ready to append to a path. The same string must be used for
/// both the signature and the request URL.
pub fn build_query_string(query: &[(&str, Option<String>)]) -> String {
    let mut parts = Vec::new();
    for (key, value) in query {
        if let Some(value) = value {
            parts.push(format!("{}={}", key, urlencoding::encode(value)));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}
