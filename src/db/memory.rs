// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local development and tests.

use crate::db::{user_id_for_client, Store};
use crate::error::AppError;
use crate::models::{LinkedAccount, TokenUpdate, User};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    accounts: Arc<DashMap<String, LinkedAccount>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_user_by_client_id(&self, client_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .get(&user_id_for_client(client_id))
            .map(|u| u.clone()))
    }

    async fn get_or_create_user(&self, client_id: &str) -> Result<User, AppError> {
        let id = user_id_for_client(client_id);
        let user = self
            .users
            .entry(id.clone())
            .or_insert_with(|| User {
                id,
                client_id: client_id.to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .clone();
        Ok(user)
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<LinkedAccount>, AppError> {
        Ok(self.accounts.get(account_id).map(|a| a.clone()))
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, AppError> {
        let mut accounts: Vec<LinkedAccount> = self
            .accounts
            .iter()
            .filter(|a| a.owner_user_id == user_id)
            .map(|a| a.clone())
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    async fn upsert_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn update_tokens(
        &self,
        account_id: &str,
        update: &TokenUpdate,
    ) -> Result<(), AppError> {
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| AppError::NotFound("Account not found.".to_string()))?;

        account.access_token = update.access_token.clone();
        account.token_expiry = update.token_expiry;
        if let Some(refresh_token) = &update.refresh_token {
            account.refresh_token = Some(refresh_token.clone());
        }
        Ok(())
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), AppError> {
        self.accounts.remove(account_id);
        Ok(())
    }
}
