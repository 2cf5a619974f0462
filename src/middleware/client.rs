// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client token middleware.
//!
//! Clients are pseudonymous: the server issues a random client ID wrapped
//! in an HS256 JWT, and the client presents it in the `X-Client-Id` header.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the client token.
pub const CLIENT_HEADER: &str = "x-client-id";

/// Client tokens are long-lived; losing one only loses the linked accounts.
const CLIENT_TOKEN_LIFETIME_SECS: usize = 365 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (client ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated client extracted from the token.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: String,
}

/// Middleware that requires a valid client token.
pub async fn require_client(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(CLIENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let client_id =
        verify_client_token(token, &state.config.client_token_key).ok_or(AppError::Unauthorized)?;

    request
        .extensions_mut()
        .insert(ClientIdentity { client_id });

    Ok(next.run(request).await)
}

/// Generate a fresh random client ID.
pub fn new_client_id() -> Result<String, AppError> {
    Ok(hex::encode(crate::db::random_bytes::<16>()?))
}

/// Create a signed client token.
pub fn create_client_token(client_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: client_id.to_string(),
        iat: now,
        exp: now + CLIENT_TOKEN_LIFETIME_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a client token and return its client ID.
pub fn verify_client_token(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    Some(token_data.claims.sub).filter(|sub| !sub.is_empty())
}
