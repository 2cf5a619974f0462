// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The Google OAuth client settings are optional at startup. Operations
//! that need them fail with [`AppError::ConfigMissing`] instead, so the
//! server can still answer health checks and list accounts while the
//! OAuth client is being provisioned.

use crate::error::AppError;
use std::env;

/// Google OAuth client settings.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client (None if any part is unset)
    pub google_oauth: Option<GoogleOAuthConfig>,
    /// Frontend origin for CORS and OAuth redirects
    pub frontend_origin: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub storage_backend: StorageBackend,

    // --- Secrets ---
    /// HS256 key for client tokens (raw bytes)
    pub client_token_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Input key material for token-at-rest encryption
    pub token_encryption_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            google_oauth: Some(GoogleOAuthConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
            }),
            frontend_origin: "http://localhost:4200".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 3000,
            storage_backend: StorageBackend::Memory,
            client_token_key: b"test_client_key_32_bytes_minimum".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            token_encryption_key: b"test_encryption_key".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("firestore") | Err(_) => StorageBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORAGE_BACKEND")),
        };

        Ok(Self {
            google_oauth: google_oauth_from_env(),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            storage_backend,

            client_token_key: required_secret("CLIENT_TOKEN_KEY")?,
            oauth_state_key: required_secret("OAUTH_STATE_KEY")?,
            token_encryption_key: required_secret("TOKEN_ENCRYPTION_KEY")?,
        })
    }

    /// Google OAuth settings, or `ConfigMissing` if they were not provided.
    pub fn google_oauth(&self) -> Result<&GoogleOAuthConfig, AppError> {
        self.google_oauth.as_ref().ok_or(AppError::ConfigMissing)
    }
}

fn google_oauth_from_env() -> Option<GoogleOAuthConfig> {
    let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

    Some(GoogleOAuthConfig {
        client_id: non_empty("GOOGLE_CLIENT_ID")?,
        client_secret: non_empty("GOOGLE_CLIENT_SECRET")?.trim().to_string(),
        redirect_uri: non_empty("GOOGLE_REDIRECT_URI")?,
    })
}

fn required_secret(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    env::var(name)
        .map(|v| v.trim().as_bytes().to_vec())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
