// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cross-account file transfer.
//!
//! Handles the core workflow:
//! 1. Validate the request and resolve both accounts
//! 2. Acquire a session for each account
//! 3. Fetch source metadata and reject native Google documents
//! 4. Relay the source content stream into an upload on the target
//! 5. For a move, delete the source only after the upload succeeded

use crate::error::AppError;
use crate::models::NewFile;
use crate::services::accounts::AccountResolver;
use crate::services::session::SessionManager;
use futures_util::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What to do with the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Copy,
    Move,
}

/// Transfer request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub source_account_id: String,
    #[serde(default)]
    pub target_account_id: String,
    #[serde(default)]
    pub file_id: String,
    pub action: TransferAction,
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// ID of the new file in the target account
    pub new_file_id: String,
    pub bytes_relayed: u64,
    pub source_deleted: bool,
}

/// Copies or moves a file between two linked accounts.
#[derive(Clone)]
pub struct TransferService {
    accounts: AccountResolver,
    sessions: SessionManager,
}

impl TransferService {
    pub fn new(accounts: AccountResolver, sessions: SessionManager) -> Self {
        Self { accounts, sessions }
    }

    /// Run a transfer for the given client.
    ///
    /// Request validation happens before any store or network access. A
    /// move whose cleanup delete fails returns `PartialFailure`: the target
    /// copy is kept and the source is left in place.
    pub async fn transfer(
        &self,
        client_id: &str,
        request: &TransferRequest,
    ) -> Result<TransferOutcome, AppError> {
        if request.file_id.is_empty() {
            return Err(AppError::InvalidRequest("fileId is required.".to_string()));
        }

        if request.source_account_id == request.target_account_id {
            return Err(AppError::InvalidRequest(
                "Source and target accounts must differ.".to_string(),
            ));
        }

        let source_account = self
            .accounts
            .resolve(client_id, &request.source_account_id)
            .await?;
        let target_account = self
            .accounts
            .resolve(client_id, &request.target_account_id)
            .await?;

        let source = self
            .sessions
            .acquire_session(&source_account.owner_user_id, &source_account.id)
            .await?;
        let target = self
            .sessions
            .acquire_session(&target_account.owner_user_id, &target_account.id)
            .await?;

        let metadata = source.file_metadata(&request.file_id).await?;
        if metadata.is_native_document() {
            return Err(AppError::UnsupportedFileType(
                "Google Docs exports are not supported yet.".to_string(),
            ));
        }

        tracing::info!(
            source_account = %source.account_id(),
            target_account = %target.account_id(),
            file_id = %request.file_id,
            mime_type = %metadata.mime_type,
            size = ?metadata.size,
            action = ?request.action,
            "Starting transfer"
        );

        let relayed = Arc::new(AtomicU64::new(0));
        let counter = relayed.clone();
        let content = source
            .open_read_stream(&request.file_id)
            .await?
            .inspect_ok(move |chunk| {
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .boxed();

        let new_file = NewFile {
            name: metadata.name.clone(),
            mime_type: metadata.mime_type.clone(),
        };
        let new_file_id = target.create_from_stream(&new_file, content).await?;
        let bytes_relayed = relayed.load(Ordering::Relaxed);

        tracing::info!(
            new_file_id = %new_file_id,
            bytes_relayed,
            "File copied to target account"
        );

        if request.action == TransferAction::Move {
            if let Err(e) = source.delete_file(&request.file_id).await {
                tracing::warn!(
                    error = %e,
                    file_id = %request.file_id,
                    new_file_id = %new_file_id,
                    "Source delete failed after copy, file now exists in both accounts"
                );
                return Err(AppError::PartialFailure {
                    new_file_id,
                    message: e.to_string(),
                });
            }
            tracing::info!(file_id = %request.file_id, "Source file deleted");
        }

        Ok(TransferOutcome {
            new_file_id,
            bytes_relayed,
            source_deleted: request.action == TransferAction::Move,
        })
    }
}
