// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cross-account file transfer route.

use crate::error::{AppError, Result};
use crate::middleware::ClientIdentity;
use crate::routes::accounts::SuccessResponse;
use crate::services::TransferRequest;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/files/transfer", post(transfer_file))
}

/// Copy or move a file between two of the client's linked accounts.
async fn transfer_file(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
    body: std::result::Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>> {
    let Json(request) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let outcome = state
        .transfers
        .transfer(&client.client_id, &request)
        .await?;

    tracing::debug!(
        new_file_id = %outcome.new_file_id,
        bytes = outcome.bytes_relayed,
        "Transfer request completed"
    );

    Ok(Json(SuccessResponse { success: true }))
}
