// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tuya OAuth linking routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tuya/login", get(login))
        .route("/api/tuya/auth/callback", get(auth_callback))
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct LoginParams {
    /// Opaque state round-tripped through the authorization redirect.
    state: Option<String>,
}

/// Start the OAuth flow - redirect to the Tuya authorization page.
async fn login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
) -> Redirect {
    let auth_url = state.tuya.build_auth_url(params.state.as_deref());
    tracing::info!("Starting Tuya OAuth flow, redirecting to authorization page");
    Redirect::temporary(&auth_url)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// OAuth callback - exchange the authorization code and hand the user back
/// to the app (deep link when configured, else the web landing page).
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let credential = state.tuya.exchange_code(&code).await?;

    if let Some(deep_link) = &state.config.deep_link_url {
        let url = append_params(deep_link, &credential.uid, params.state.as_deref());
        return Ok(Redirect::temporary(&url).into_response());
    }

    if let Some(backend_url) = &state.config.backend_url {
        let landing = format!("{}/connected", backend_url.trim_end_matches('/'));
        let url = append_params(&landing, &credential.uid, params.state.as_deref());
        return Ok(Redirect::temporary(&url).into_response());
    }

    // No redirect target configured; answer the linked uid directly.
    Ok(Json(json!({ "uid": credential.uid })).into_response())
}

/// Append `uid` (and `state` when present) to a URL that may already carry
/// a query string.
fn append_params(url: &str, uid: &str, state: Option<&str>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    let mut out = format!("{}{}uid={}", url, separator, urlencoding::encode(uid));
    if let Some(state) = state {
        out.push_str("&state=");
        out.push_str(&urlencoding::encode(state));
    }
    out
}
