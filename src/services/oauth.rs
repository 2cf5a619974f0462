// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google account linking via the OAuth authorization-code flow.

use crate::config::GoogleOAuthConfig;
use crate::db::{account_id_for_provider, Store};
use crate::error::AppError;
use crate::models::{LinkedAccount, PROVIDER_GOOGLE};
use crate::services::google::GoogleApi;
use chrono::{Duration, Utc};
use std::sync::Arc;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

const GOOGLE_SCOPES: [&str; 4] = [
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/drive",
];

/// Links Google accounts to pseudonymous users.
#[derive(Clone)]
pub struct OAuthService {
    api: Arc<dyn GoogleApi>,
    store: Arc<dyn Store>,
    oauth: Option<GoogleOAuthConfig>,
}

impl OAuthService {
    pub fn new(
        api: Arc<dyn GoogleApi>,
        store: Arc<dyn Store>,
        oauth: Option<GoogleOAuthConfig>,
    ) -> Self {
        Self { api, store, oauth }
    }

    fn config(&self) -> Result<&GoogleOAuthConfig, AppError> {
        self.oauth.as_ref().ok_or(AppError::ConfigMissing)
    }

    /// Google consent URL requesting offline access.
    ///
    /// Consent is always prompted so that Google issues a refresh token even
    /// when the account was linked before.
    pub fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let oauth = self.config()?;

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
             &access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&oauth.client_id),
            urlencoding::encode(&oauth.redirect_uri),
            urlencoding::encode(&GOOGLE_SCOPES.join(" ")),
            urlencoding::encode(state),
        ))
    }

    /// Exchange the code, read the profile, and upsert the linked account.
    pub async fn handle_callback(
        &self,
        code: &str,
        client_id: &str,
    ) -> Result<LinkedAccount, AppError> {
        if code.is_empty() || client_id.is_empty() {
            return Err(AppError::InvalidRequest(
                "Missing OAuth response data.".to_string(),
            ));
        }

        let oauth = self.config()?;
        let tokens = self.api.exchange_code(oauth, code).await?;
        let access_token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidRequest("Missing access token.".to_string()))?;

        let profile = self.api.get_profile(&access_token).await?;
        let (Some(provider_account_id), Some(email)) = (profile.id, profile.email) else {
            return Err(AppError::InvalidRequest(
                "Unable to read Google profile.".to_string(),
            ));
        };

        let user = self.store.get_or_create_user(client_id).await?;
        let id = account_id_for_provider(PROVIDER_GOOGLE, &provider_account_id);
        let existing = self.store.get_account(&id).await?;

        let now = Utc::now();
        let (created_at, previous_refresh) = match existing {
            Some(a) => (a.created_at, a.refresh_token),
            None => (now, None),
        };

        // Re-linking moves the account to the new owner.
        let account = LinkedAccount {
            id,
            owner_user_id: user.id,
            provider: PROVIDER_GOOGLE.to_string(),
            provider_account_id,
            email,
            display_name: profile.name,
            access_token,
            refresh_token: tokens.refresh_token.or(previous_refresh),
            token_expiry: tokens.expires_in.map(|secs| now + Duration::seconds(secs)),
            created_at,
        };

        self.store.upsert_account(&account).await?;

        tracing::info!(
            account_id = %account.id,
            has_refresh_token = account.refresh_token.is_some(),
            "Google account linked"
        );

        Ok(account)
    }
}
