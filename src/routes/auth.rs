// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client token issue and Google account linking routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::client::{create_client_token, new_client_id, verify_client_token};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a consent round-trip may take before the state is rejected.
const STATE_MAX_AGE_MS: u128 = 15 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/client", post(issue_client_token))
        .route("/auth/google/start", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClientTokenResponse {
    pub client_token: String,
}

/// Issue a token for a brand new pseudonymous client.
async fn issue_client_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClientTokenResponse>> {
    let client_id = new_client_id()?;
    let client_token = create_client_token(&client_id, &state.config.client_token_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!("Issued new client token");

    Ok(Json(ClientTokenResponse { client_token }))
}

#[derive(Deserialize)]
pub struct AuthStartParams {
    #[serde(default)]
    client: String,
}

/// Start OAuth flow - redirect to Google consent.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let client_id = verify_client_token(&params.client, &state.config.client_token_key)
        .ok_or(AppError::Unauthorized)?;

    let oauth_state = sign_state(&client_id, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state.oauth.authorization_url(&oauth_state)?;

    tracing::info!("Starting OAuth flow, redirecting to Google");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - link the account and bounce back to the frontend.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend = state.config.frontend_origin.trim_end_matches('/');

    match link_account(&state, params).await {
        Ok(()) => Redirect::temporary(&format!("{}/?linked=1", frontend)),
        Err(e) => {
            tracing::warn!(error = %e, "Account linking failed");
            Redirect::temporary(&format!(
                "{}/?linked=0&error={}",
                frontend,
                urlencoding::encode(&e.public_message())
            ))
        }
    }
}

async fn link_account(state: &AppState, params: CallbackParams) -> Result<()> {
    if let Some(error) = params.error {
        return Err(AppError::InvalidRequest(format!(
            "Google declined the request: {}",
            error
        )));
    }

    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return Err(AppError::InvalidRequest(
            "Missing OAuth response data.".to_string(),
        ));
    };

    let client_id = verify_state(&oauth_state, &state.config.oauth_state_key, now_millis()?)
        .ok_or_else(|| AppError::InvalidRequest("Invalid OAuth state.".to_string()))?;

    state.oauth.handle_callback(&code, &client_id).await?;
    Ok(())
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn state_signature(payload: &str, secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Encode "client_id|timestamp_hex|signature_hex" as base64url.
fn sign_state(client_id: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", client_id, timestamp_ms);
    let signature = state_signature(&payload, secret)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC init failed")))?;

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify the state signature and age, returning the client ID it carries.
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let mut parts = state_str.splitn(3, '|');
    let (client_id, timestamp_hex, signature_hex) = (parts.next()?, parts.next()?, parts.next()?);

    let expected = state_signature(&format!("{}|{}", client_id, timestamp_hex), secret)?;
    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(client_id.to_string()).filter(|c| !c.is_empty())
}
