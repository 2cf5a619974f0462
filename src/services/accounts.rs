// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account resolution and ownership checks.

use crate::db::Store;
use crate::error::AppError;
use crate::models::LinkedAccount;
use std::sync::Arc;

/// The single outward error for unknown users and foreign accounts.
pub fn account_not_found() -> AppError {
    AppError::NotFound("Account not found.".to_string())
}

/// Maps a client ID and account ID to an account the client owns.
#[derive(Clone)]
pub struct AccountResolver {
    store: Arc<dyn Store>,
}

impl AccountResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve an account owned by the client.
    ///
    /// An unknown client and an account owned by another client give the
    /// same error, so callers cannot probe for other users' accounts.
    pub async fn resolve(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> Result<LinkedAccount, AppError> {
        if client_id.is_empty() {
            return Err(AppError::InvalidRequest("Missing clientId.".to_string()));
        }

        let Some(user) = self.store.get_user_by_client_id(client_id).await? else {
            return Err(account_not_found());
        };

        self.store
            .get_account(account_id)
            .await?
            .filter(|a| a.owner_user_id == user.id)
            .ok_or_else(account_not_found)
    }

    /// List the client's accounts, oldest first. Unknown clients have none.
    pub async fn list(&self, client_id: &str) -> Result<Vec<LinkedAccount>, AppError> {
        match self.store.get_user_by_client_id(client_id).await? {
            Some(user) => self.store.list_accounts(&user.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Unlink one of the client's accounts.
    pub async fn remove(&self, client_id: &str, account_id: &str) -> Result<(), AppError> {
        let account = self.resolve(client_id, account_id).await?;
        self.store.delete_account(&account.id).await?;

        tracing::info!(account_id = %account.id, "Linked account removed");
        Ok(())
    }
}
