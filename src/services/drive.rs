// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only Drive views for a linked account.

use crate::error::AppError;
use crate::models::{DriveUsage, FileList};
use crate::services::accounts::AccountResolver;
use crate::services::session::{DriveSession, SessionManager};

/// Usage and file listing for a client's linked accounts.
#[derive(Clone)]
pub struct DriveService {
    accounts: AccountResolver,
    sessions: SessionManager,
}

impl DriveService {
    pub fn new(accounts: AccountResolver, sessions: SessionManager) -> Self {
        Self { accounts, sessions }
    }

    async fn session(&self, client_id: &str, account_id: &str) -> Result<DriveSession, AppError> {
        let account = self.accounts.resolve(client_id, account_id).await?;
        self.sessions
            .acquire_session(&account.owner_user_id, &account.id)
            .await
    }

    /// Storage quota and owner for an account.
    pub async fn usage(&self, client_id: &str, account_id: &str) -> Result<DriveUsage, AppError> {
        self.session(client_id, account_id).await?.usage().await
    }

    /// One page of the account's root folder.
    pub async fn list_files(
        &self,
        client_id: &str,
        account_id: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, AppError> {
        self.session(client_id, account_id)
            .await?
            .list_files(page_token)
            .await
    }
}
