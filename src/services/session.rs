// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token session management.
//!
//! A [`DriveSession`] is an authenticated handle to one linked account,
//! carrying an immutable credential snapshot. Sessions are acquired fresh
//! per request; nothing is cached across requests.
//!
//! Acquisition always runs a refresh probe:
//! 1. Load the stored token triple for the account
//! 2. If the access token is missing or expires within the margin,
//!    refresh it with the refresh token
//! 3. If the tokens changed, write them back to the store
//! 4. Only then hand out the session

use crate::config::GoogleOAuthConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{DriveUsage, FileList, FileMetadata, LinkedAccount, NewFile, TokenUpdate};
use crate::services::accounts::account_not_found;
use crate::services::google::{ByteStream, GoogleApi};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Credential snapshot for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// None means the provider never told us; treated as still valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn from_account(account: &LinkedAccount) -> Self {
        Self {
            access_token: account.access_token.clone(),
            refresh_token: account.refresh_token.clone(),
            expires_at: account.token_expiry,
        }
    }

    /// Whether the access token must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        matches!(self.expires_at, Some(expires_at) if now + margin >= expires_at)
    }
}

/// Authenticated handle to one linked account's Drive.
#[derive(Clone)]
pub struct DriveSession {
    account_id: String,
    credentials: Credentials,
    api: Arc<dyn GoogleApi>,
}

impl std::fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSession")
            .field("account_id", &self.account_id)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl DriveSession {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata, AppError> {
        self.api
            .get_file_metadata(&self.credentials.access_token, file_id)
            .await
    }

    pub async fn open_read_stream(&self, file_id: &str) -> Result<ByteStream, AppError> {
        self.api
            .open_read_stream(&self.credentials.access_token, file_id)
            .await
    }

    pub async fn create_from_stream(
        &self,
        file: &NewFile,
        body: ByteStream,
    ) -> Result<String, AppError> {
        self.api
            .create_from_stream(&self.credentials.access_token, file, body)
            .await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), AppError> {
        self.api
            .delete_file(&self.credentials.access_token, file_id)
            .await
    }

    pub async fn usage(&self) -> Result<DriveUsage, AppError> {
        self.api.get_usage(&self.credentials.access_token).await
    }

    pub async fn list_files(&self, page_token: Option<&str>) -> Result<FileList, AppError> {
        self.api
            .list_files(&self.credentials.access_token, page_token)
            .await
    }
}

/// Produces live sessions and keeps the store in step with refreshed tokens.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn GoogleApi>,
    store: Arc<dyn Store>,
    oauth: Option<GoogleOAuthConfig>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn GoogleApi>,
        store: Arc<dyn Store>,
        oauth: Option<GoogleOAuthConfig>,
    ) -> Self {
        Self { api, store, oauth }
    }

    /// Acquire a session for an account owned by `user_id`.
    ///
    /// Fails with `NotFound` if the account is missing or owned by someone
    /// else, `ConfigMissing` without OAuth client settings, and
    /// `RefreshFailed` if no usable access token can be obtained. On
    /// `RefreshFailed` the store is left untouched.
    pub async fn acquire_session(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> Result<DriveSession, AppError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .filter(|a| a.owner_user_id == user_id)
            .ok_or_else(account_not_found)?;

        let oauth = self.oauth.as_ref().ok_or(AppError::ConfigMissing)?;

        let cached = Credentials::from_account(&account);
        let fresh = self.refresh_probe(oauth, &cached, account_id).await?;

        if fresh.access_token != cached.access_token || fresh.expires_at != cached.expires_at {
            let rotated = fresh
                .refresh_token
                .clone()
                .filter(|_| fresh.refresh_token != cached.refresh_token);

            self.store
                .update_tokens(
                    account_id,
                    &TokenUpdate {
                        access_token: fresh.access_token.clone(),
                        token_expiry: fresh.expires_at,
                        refresh_token: rotated,
                    },
                )
                .await?;

            tracing::info!(account_id, "Token refreshed and stored");
        }

        Ok(DriveSession {
            account_id: account_id.to_string(),
            credentials: fresh,
            api: self.api.clone(),
        })
    }

    /// Return usable credentials, refreshing if the cached token is stale.
    async fn refresh_probe(
        &self,
        oauth: &GoogleOAuthConfig,
        cached: &Credentials,
        account_id: &str,
    ) -> Result<Credentials, AppError> {
        let now = Utc::now();
        if !cached.needs_refresh(now) {
            return Ok(cached.clone());
        }

        let refresh_token = cached
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::RefreshFailed("No refresh token stored".to_string()))?;

        tracing::info!(account_id, "Access token expired, refreshing");

        let response = self
            .api
            .refresh_access_token(oauth, refresh_token)
            .await
            .map_err(|e| match e {
                AppError::RefreshFailed(reason) => AppError::RefreshFailed(reason),
                other => AppError::RefreshFailed(other.to_string()),
            })?;

        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::RefreshFailed("Token endpoint returned no access token".to_string())
            })?;

        Ok(Credentials {
            access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| cached.refresh_token.clone()),
            expires_at: response.expires_in.map(|secs| now + Duration::seconds(secs)),
        })
    }
}
