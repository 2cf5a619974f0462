// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth and Drive API client.
//!
//! Handles:
//! - Authorization-code exchange and token refresh
//! - Profile lookup for newly linked accounts
//! - Drive usage, listing, metadata, and deletion
//! - Streaming download and streaming multipart upload
//!
//! The [`GoogleApi`] trait is the seam used by the session and transfer
//! services, so they can run against an in-memory provider in tests.

use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::models::{DriveUsage, FileList, FileMetadata, NewFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::time::Duration;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested for listings.
const FILE_LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, modifiedTime, parents)";
/// Root folder, excluding trash.
const ROOT_QUERY: &str = "'root' in parents and trashed = false";
const PAGE_SIZE: &str = "50";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Applies to non-streaming calls only; a relay may legitimately run longer.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Incremental byte stream relayed between two sessions.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Token endpoint response (code exchange or refresh).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Only present on first consent or when Google rotates it
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Google profile from the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Google APIs used by the service.
#[async_trait]
pub trait GoogleApi: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        oauth: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<TokenResponse, AppError>;

    /// Obtain a new access token with a refresh token.
    async fn refresh_access_token(
        &self,
        oauth: &GoogleOAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse, AppError>;

    /// Profile of the account that owns the access token.
    async fn get_profile(&self, access_token: &str) -> Result<GoogleProfile, AppError>;

    /// Drive storage quota and owner.
    async fn get_usage(&self, access_token: &str) -> Result<DriveUsage, AppError>;

    /// One page of the root folder listing.
    async fn list_files(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, AppError>;

    /// Metadata for a single file.
    async fn get_file_metadata(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<FileMetadata, AppError>;

    /// Open a streaming read of a file's binary content.
    async fn open_read_stream(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<ByteStream, AppError>;

    /// Create a file whose content is read from `body`. Returns the new file ID.
    async fn create_from_stream(
        &self,
        access_token: &str,
        file: &NewFile,
        body: ByteStream,
    ) -> Result<String, AppError>;

    /// Delete a file.
    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<(), AppError>;
}

/// Raw metadata response; Drive omits fields it cannot read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileMetadata {
    id: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
    size: Option<String>,
}

impl RawFileMetadata {
    fn into_metadata(self) -> Result<FileMetadata, AppError> {
        let unreadable = || AppError::InvalidRequest("Unable to read file metadata.".to_string());

        Ok(FileMetadata {
            id: self.id.ok_or_else(unreadable)?,
            name: self.name.ok_or_else(unreadable)?,
            mime_type: self.mime_type.ok_or_else(unreadable)?,
            size: self.size.and_then(|s| s.parse().ok()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// reqwest-based Google client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
}

impl GoogleClient {
    pub fn new() -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self { http })
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .timeout(API_TIMEOUT)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<OAuthErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_description.or(b.error))
                .unwrap_or_else(|| format!("HTTP {}", status));

            tracing::warn!(status = %status, reason = %reason, "Google token endpoint rejected request");
            return Err(AppError::RefreshFailed(reason));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse token response: {}", e)))
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .timeout(API_TIMEOUT)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))
    }
}

/// Check response status and return the response if successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    match status.as_u16() {
        404 => Err(AppError::NotFound("File not found.".to_string())),
        429 => {
            tracing::warn!("Google API rate limit hit (429)");
            Err(AppError::GoogleApi("Rate limited by Google".to_string()))
        }
        _ => Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body))),
    }
}

fn file_url(base: &str, file_id: &str) -> String {
    format!("{}/files/{}", base, urlencoding::encode(file_id))
}

/// Frame a `multipart/related` upload body around a media stream.
///
/// The media part is passed through chunk by chunk; only the small
/// metadata head and closing delimiter are materialized.
fn multipart_related_body(
    boundary: &str,
    file: &NewFile,
    media: ByteStream,
) -> Result<ByteStream, AppError> {
    if file.mime_type.contains(['\r', '\n']) {
        return Err(AppError::InvalidRequest("Invalid MIME type.".to_string()));
    }

    let metadata = serde_json::json!({
        "name": file.name,
        "mimeType": file.mime_type,
    });

    let head = format!(
        "--{boundary}\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {metadata}\r\n\
         --{boundary}\r\n\
         Content-Type: {mime}\r\n\r\n",
        mime = file.mime_type,
    );
    let tail = format!("\r\n--{boundary}--\r\n");

    Ok(stream::once(async move { Ok(Bytes::from(head)) })
        .chain(media)
        .chain(stream::once(async move { Ok(Bytes::from(tail)) }))
        .boxed())
}

#[async_trait]
impl GoogleApi for GoogleClient {
    async fn exchange_code(
        &self,
        oauth: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<TokenResponse, AppError> {
        self.post_token_form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
        .map_err(|e| match e {
            AppError::RefreshFailed(reason) => {
                AppError::InvalidRequest(format!("Authorization code rejected: {}", reason))
            }
            other => other,
        })
    }

    async fn refresh_access_token(
        &self,
        oauth: &GoogleOAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse, AppError> {
        self.post_token_form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn get_profile(&self, access_token: &str) -> Result<GoogleProfile, AppError> {
        self.get_json(USERINFO_URL, access_token, &[]).await
    }

    async fn get_usage(&self, access_token: &str) -> Result<DriveUsage, AppError> {
        let url = format!("{}/about", DRIVE_API_BASE);
        self.get_json(&url, access_token, &[("fields", "storageQuota, user")])
            .await
    }

    async fn list_files(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, AppError> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let mut query = vec![
            ("fields", FILE_LIST_FIELDS),
            ("pageSize", PAGE_SIZE),
            ("q", ROOT_QUERY),
            ("orderBy", "modifiedTime desc"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        self.get_json(&url, access_token, &query).await
    }

    async fn get_file_metadata(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<FileMetadata, AppError> {
        let raw: RawFileMetadata = self
            .get_json(
                &file_url(DRIVE_API_BASE, file_id),
                access_token,
                &[("fields", "id, name, mimeType, size")],
            )
            .await?;
        raw.into_metadata()
    }

    async fn open_read_stream(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<ByteStream, AppError> {
        let response = self
            .http
            .get(file_url(DRIVE_API_BASE, file_id))
            .bearer_auth(access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Download request failed: {}", e)))?;

        let response = check_response(response).await?;
        Ok(response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed())
    }

    async fn create_from_stream(
        &self,
        access_token: &str,
        file: &NewFile,
        body: ByteStream,
    ) -> Result<String, AppError> {
        let boundary = format!(
            "drive-relay-{}",
            hex::encode(crate::db::random_bytes::<12>()?)
        );
        let body = multipart_related_body(&boundary, file, body)?;

        let response = self
            .http
            .post(format!("{}/files", DRIVE_UPLOAD_BASE))
            .bearer_auth(access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Upload failed: {}", e)))?;

        let created: CreatedFile = check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse upload response: {}", e)))?;

        Ok(created.id)
    }

    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(file_url(DRIVE_API_BASE, file_id))
            .timeout(API_TIMEOUT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Delete request failed: {}", e)))?;

        check_response(response).await?;
        Ok(())
    }
}
