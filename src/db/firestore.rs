// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (pseudonymous client identities)
//! - Linked accounts (profile plus encrypted OAuth tokens)

use crate::db::{collections, user_id_for_client, Store};
use crate::error::AppError;
use crate::models::{LinkedAccount, TokenUpdate, User};
use crate::services::TokenCipher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linked account document as stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccount {
    id: String,
    owner_user_id: String,
    provider: String,
    provider_account_id: String,
    email: String,
    display_name: Option<String>,
    /// Encrypted access token (base64)
    access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    refresh_token_encrypted: Option<String>,
    /// Access token expiry (ISO 8601)
    token_expiry: Option<String>,
    created_at: String,
}

/// Field-masked write of the access token and expiry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access_token_encrypted: String,
    token_expiry: Option<String>,
}

/// Field-masked write including a rotated refresh token.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRotatedTokens {
    access_token_encrypted: String,
    token_expiry: Option<String>,
    refresh_token_encrypted: Option<String>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
    cipher: TokenCipher,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, cipher: TokenCipher) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, cipher).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client, cipher })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(
        project_id: &str,
        cipher: TokenCipher,
    ) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client, cipher })
    }

    // ─── Conversions ─────────────────────────────────────────────

    fn to_stored(&self, account: &LinkedAccount) -> Result<StoredAccount, AppError> {
        let refresh_token_encrypted = account
            .refresh_token
            .as_deref()
            .map(|t| self.cipher.encrypt(t, &account.id))
            .transpose()?;

        Ok(StoredAccount {
            id: account.id.clone(),
            owner_user_id: account.owner_user_id.clone(),
            provider: account.provider.clone(),
            provider_account_id: account.provider_account_id.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            access_token_encrypted: self.cipher.encrypt(&account.access_token, &account.id)?,
            refresh_token_encrypted,
            token_expiry: account.token_expiry.map(|t| t.to_rfc3339()),
            created_at: account.created_at.to_rfc3339(),
        })
    }

    fn from_stored(&self, doc: StoredAccount) -> Result<LinkedAccount, AppError> {
        let access_token = self.cipher.decrypt(&doc.access_token_encrypted, &doc.id)?;
        let refresh_token = doc
            .refresh_token_encrypted
            .as_deref()
            .map(|t| self.cipher.decrypt(t, &doc.id))
            .transpose()?;

        Ok(LinkedAccount {
            access_token,
            refresh_token,
            token_expiry: doc.token_expiry.as_deref().map(parse_time).transpose()?,
            created_at: parse_time(&doc.created_at)?,
            id: doc.id,
            owner_user_id: doc.owner_user_id,
            provider: doc.provider,
            provider_account_id: doc.provider_account_id,
            email: doc.email,
            display_name: doc.display_name,
        })
    }

    async fn get_stored_account(&self, account_id: &str) -> Result<Option<StoredAccount>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::LINKED_ACCOUNTS)
            .obj()
            .one(account_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse timestamp: {}", e)))
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user_by_client_id(&self, client_id: &str) -> Result<Option<User>, AppError> {
        let user: Option<User> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id_for_client(client_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(user.filter(|u| u.client_id == client_id))
    }

    async fn get_or_create_user(&self, client_id: &str) -> Result<User, AppError> {
        if let Some(user) = self.get_user_by_client_id(client_id).await? {
            return Ok(user);
        }

        let user = User {
            id: user_id_for_client(client_id),
            client_id: client_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(&user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    // ─── Linked Account Operations ───────────────────────────────

    async fn get_account(&self, account_id: &str) -> Result<Option<LinkedAccount>, AppError> {
        self.get_stored_account(account_id)
            .await?
            .map(|doc| self.from_stored(doc))
            .transpose()
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, AppError> {
        let docs: Vec<StoredAccount> = self
            .client
            .fluent()
            .select()
            .from(collections::LINKED_ACCOUNTS)
            .filter(|q| q.for_all([q.field("owner_user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Sorted here rather than in the query to avoid a composite index.
        let mut accounts = docs
            .into_iter()
            .map(|doc| self.from_stored(doc))
            .collect::<Result<Vec<_>, _>>()?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    async fn upsert_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        let doc = self.to_stored(account)?;

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::LINKED_ACCOUNTS)
            .document_id(&doc.id)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_tokens(
        &self,
        account_id: &str,
        update: &TokenUpdate,
    ) -> Result<(), AppError> {
        // A masked update on a missing document would create a partial row.
        if self.get_stored_account(account_id).await?.is_none() {
            return Err(AppError::NotFound("Account not found.".to_string()));
        }

        let access_token_encrypted = self.cipher.encrypt(&update.access_token, account_id)?;
        let token_expiry = update.token_expiry.map(|t| t.to_rfc3339());

        let write = match &update.refresh_token {
            None => {
                let doc = StoredTokens {
                    access_token_encrypted,
                    token_expiry,
                };
                self.client
                    .fluent()
                    .update()
                    .fields(firestore::paths!(StoredTokens::{
                        access_token_encrypted,
                        token_expiry
                    }))
                    .in_col(collections::LINKED_ACCOUNTS)
                    .document_id(account_id)
                    .object(&doc)
                    .execute::<()>()
                    .await
            }
            Some(refresh_token) => {
                let doc = StoredRotatedTokens {
                    access_token_encrypted,
                    token_expiry,
                    refresh_token_encrypted: Some(self.cipher.encrypt(refresh_token, account_id)?),
                };
                self.client
                    .fluent()
                    .update()
                    .fields(firestore::paths!(StoredRotatedTokens::{
                        access_token_encrypted,
                        token_expiry,
                        refresh_token_encrypted
                    }))
                    .in_col(collections::LINKED_ACCOUNTS)
                    .document_id(account_id)
                    .object(&doc)
                    .execute::<()>()
                    .await
            }
        };

        write.map_err(|e| AppError::Database(e.to_string()))?;
        tracing::debug!(account_id, "Stored refreshed tokens");
        Ok(())
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::LINKED_ACCOUNTS)
            .document_id(account_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
