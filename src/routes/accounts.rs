// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Linked account routes.

use crate::error::Result;
use crate::middleware::ClientIdentity;
use crate::models::{DriveUsage, FileList, LinkedAccount};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Account routes (require a client token, applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/{account_id}", delete(remove_account))
        .route("/accounts/{account_id}/usage", get(get_usage))
        .route("/accounts/{account_id}/files", get(list_files))
}

/// Linked account as shown to the client. Tokens never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccountSummary {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<LinkedAccount> for AccountSummary {
    fn from(account: LinkedAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            provider: account.provider,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuccessResponse {
    pub success: bool,
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
) -> Result<Json<Vec<AccountSummary>>> {
    let accounts = state.accounts.list(&client.client_id).await?;
    Ok(Json(accounts.into_iter().map(AccountSummary::from).collect()))
}

async fn remove_account(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
    Path(account_id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.accounts.remove(&client.client_id, &account_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
    Path(account_id): Path<String>,
) -> Result<Json<DriveUsage>> {
    Ok(Json(
        state.drive.usage(&client.client_id, &account_id).await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    #[serde(default)]
    page_token: Option<String>,
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
    Path(account_id): Path<String>,
    Query(params): Query<ListFilesParams>,
) -> Result<Json<FileList>> {
    let page_token = params.page_token.as_deref().filter(|t| !t.is_empty());
    Ok(Json(
        state
            .drive
            .list_files(&client.client_id, &account_id, page_token)
            .await?,
    ))
}
