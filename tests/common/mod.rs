// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: an in-memory Google provider and app builders.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use drive_relay::config::{Config, GoogleOAuthConfig};
use drive_relay::db::{account_id_for_provider, MemoryDb, Store};
use drive_relay::error::AppError;
use drive_relay::middleware::client::create_client_token;
use drive_relay::models::drive::{DriveUser, StorageQuota};
use drive_relay::models::{
    DriveFile, DriveUsage, FileList, FileMetadata, LinkedAccount, NewFile, TokenUpdate, User,
    PROVIDER_GOOGLE,
};
use drive_relay::routes::create_router;
use drive_relay::services::{ByteStream, GoogleApi, GoogleProfile, TokenResponse};
use drive_relay::AppState;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// A file held by the fake provider.
#[derive(Debug, Clone)]
pub struct FakeFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// Number of calls made to each provider operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub refresh: usize,
    pub metadata: usize,
    pub read: usize,
    pub create: usize,
    pub delete: usize,
}

/// How a relayed download was consumed by the upload side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayTrace {
    /// Chunks pulled from the download before the upload started reading
    pub pulled_before_upload: usize,
    /// Chunks pulled from the download as each upload chunk arrived
    pub pulled_per_chunk: Vec<usize>,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.refresh + self.metadata + self.read + self.create + self.delete
    }
}

struct RefreshGrant {
    drive: String,
    access_token: String,
    rotated_refresh_token: Option<String>,
}

struct LinkGrant {
    drive: String,
    access_token: String,
    refresh_token: Option<String>,
    profile: GoogleProfile,
}

#[derive(Default)]
struct FakeState {
    /// access token -> drive name
    tokens: HashMap<String, String>,
    /// drive name -> file id -> file
    drives: HashMap<String, BTreeMap<String, FakeFile>>,
    refresh: HashMap<String, RefreshGrant>,
    revoked: HashSet<String>,
    codes: HashMap<String, LinkGrant>,
    /// access token -> profile
    profiles: HashMap<String, GoogleProfile>,
    fail_delete: bool,
    /// Give every refresh a distinct access token and lifetime
    numbered_refresh: bool,
    next_id: u64,
    calls: CallCounts,
    /// Pull counter of the most recently opened download
    last_download: Option<Arc<AtomicUsize>>,
    relay_trace: Option<RelayTrace>,
}

/// In-memory Google provider.
///
/// Each drive is reachable through one or more access tokens. Content is
/// served in small chunks so transfers exercise the streaming path.
#[derive(Default)]
pub struct FakeGoogle {
    state: Mutex<FakeState>,
}

impl FakeGoogle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `access_token` open `drive`.
    pub fn grant(&self, drive: &str, access_token: &str) {
        let mut s = self.state.lock().unwrap();
        s.tokens.insert(access_token.to_string(), drive.to_string());
        s.drives.entry(drive.to_string()).or_default();
    }

    /// Make `refresh_token` mint `access_token` for `drive`.
    pub fn grant_refresh(
        &self,
        drive: &str,
        refresh_token: &str,
        access_token: &str,
        rotated: Option<&str>,
    ) {
        let mut s = self.state.lock().unwrap();
        s.refresh.insert(
            refresh_token.to_string(),
            RefreshGrant {
                drive: drive.to_string(),
                access_token: access_token.to_string(),
                rotated_refresh_token: rotated.map(str::to_string),
            },
        );
        s.drives.entry(drive.to_string()).or_default();
    }

    pub fn revoke(&self, refresh_token: &str) {
        self.state
            .lock()
            .unwrap()
            .revoked
            .insert(refresh_token.to_string());
    }

    /// Register an authorization code for the OAuth callback.
    pub fn grant_code(
        &self,
        code: &str,
        drive: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        profile_id: &str,
        email: &str,
    ) {
        let mut s = self.state.lock().unwrap();
        s.codes.insert(
            code.to_string(),
            LinkGrant {
                drive: drive.to_string(),
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
                profile: GoogleProfile {
                    id: Some(profile_id.to_string()),
                    email: Some(email.to_string()),
                    name: Some("Test User".to_string()),
                },
            },
        );
    }

    pub fn put_file(&self, drive: &str, file_id: &str, name: &str, mime_type: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .drives
            .entry(drive.to_string())
            .or_default()
            .insert(
                file_id.to_string(),
                FakeFile {
                    name: name.to_string(),
                    mime_type: mime_type.to_string(),
                    content: content.to_vec(),
                },
            );
    }

    pub fn files(&self, drive: &str) -> BTreeMap<String, FakeFile> {
        self.state
            .lock()
            .unwrap()
            .drives
            .get(drive)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    pub fn set_numbered_refresh(&self, numbered: bool) {
        self.state.lock().unwrap().numbered_refresh = numbered;
    }

    /// Trace of the last upload fed from a download stream.
    pub fn relay_trace(&self) -> Option<RelayTrace> {
        self.state.lock().unwrap().relay_trace.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    fn drive_for(s: &FakeState, access_token: &str) -> Result<String, AppError> {
        s.tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::GoogleApi("Google API returned 401".to_string()))
    }
}

fn not_found() -> AppError {
    AppError::NotFound("File not found.".to_string())
}

#[async_trait]
impl GoogleApi for FakeGoogle {
    async fn exchange_code(
        &self,
        _oauth: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<TokenResponse, AppError> {
        let mut s = self.state.lock().unwrap();
        let grant = s
            .codes
            .remove(code)
            .ok_or_else(|| AppError::InvalidRequest("Invalid authorization code.".to_string()))?;

        s.tokens
            .insert(grant.access_token.clone(), grant.drive.clone());
        s.drives.entry(grant.drive).or_default();
        s.profiles
            .insert(grant.access_token.clone(), grant.profile);

        Ok(TokenResponse {
            access_token: Some(grant.access_token),
            expires_in: Some(3600),
            refresh_token: grant.refresh_token,
        })
    }

    async fn refresh_access_token(
        &self,
        _oauth: &GoogleOAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse, AppError> {
        let mut s = self.state.lock().unwrap();
        s.calls.refresh += 1;

        if s.revoked.contains(refresh_token) {
            return Err(AppError::RefreshFailed("invalid_grant".to_string()));
        }
        let grant = s
            .refresh
            .get(refresh_token)
            .ok_or_else(|| AppError::RefreshFailed("invalid_grant".to_string()))?;
        let (drive, mut access_token, rotated) = (
            grant.drive.clone(),
            grant.access_token.clone(),
            grant.rotated_refresh_token.clone(),
        );
        let mut expires_in = 3600;
        if s.numbered_refresh {
            let n = s.calls.refresh;
            access_token = format!("{}-{}", access_token, n);
            expires_in += 60 * n as i64;
        }
        s.tokens.insert(access_token.clone(), drive);

        Ok(TokenResponse {
            access_token: Some(access_token),
            expires_in: Some(expires_in),
            refresh_token: rotated,
        })
    }

    async fn get_profile(&self, access_token: &str) -> Result<GoogleProfile, AppError> {
        let s = self.state.lock().unwrap();
        s.profiles
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::GoogleApi("Google API returned 401".to_string()))
    }

    async fn get_usage(&self, access_token: &str) -> Result<DriveUsage, AppError> {
        let s = self.state.lock().unwrap();
        let drive = Self::drive_for(&s, access_token)?;
        let used: usize = s.drives[&drive].values().map(|f| f.content.len()).sum();

        Ok(DriveUsage {
            storage_quota: StorageQuota {
                limit: Some("16106127360".to_string()),
                usage: Some(used.to_string()),
                usage_in_drive: Some(used.to_string()),
                usage_in_drive_trash: Some("0".to_string()),
            },
            user: DriveUser {
                kind: Some("drive#user".to_string()),
                display_name: Some(drive.clone()),
                email_address: Some(format!("{}@example.com", drive)),
                photo_link: None,
                me: Some(true),
                permission_id: Some(format!("perm-{}", drive)),
            },
        })
    }

    async fn list_files(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, AppError> {
        let s = self.state.lock().unwrap();
        let drive = Self::drive_for(&s, access_token)?;

        // Two files per page; the page token is the last ID served.
        let files: Vec<DriveFile> = s.drives[&drive]
            .iter()
            .filter(|(id, _)| page_token.is_none_or(|after| id.as_str() > after))
            .take(2)
            .map(|(id, f)| DriveFile {
                id: id.clone(),
                name: f.name.clone(),
                mime_type: f.mime_type.clone(),
                size: Some(f.content.len().to_string()),
                modified_time: None,
                parents: vec!["root".to_string()],
            })
            .collect();

        let next_page_token = match files.last() {
            Some(last) if s.drives[&drive].keys().any(|id| id > &last.id) => Some(last.id.clone()),
            _ => None,
        };

        Ok(FileList {
            files,
            next_page_token,
        })
    }

    async fn get_file_metadata(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<FileMetadata, AppError> {
        let mut s = self.state.lock().unwrap();
        s.calls.metadata += 1;
        let drive = Self::drive_for(&s, access_token)?;
        let file = s.drives[&drive].get(file_id).ok_or_else(not_found)?;

        Ok(FileMetadata {
            id: file_id.to_string(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: Some(file.content.len() as u64),
        })
    }

    async fn open_read_stream(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<ByteStream, AppError> {
        let mut s = self.state.lock().unwrap();
        s.calls.read += 1;
        let drive = Self::drive_for(&s, access_token)?;
        let content = s.drives[&drive]
            .get(file_id)
            .ok_or_else(not_found)?
            .content
            .clone();

        let pulled = Arc::new(AtomicUsize::new(0));
        s.last_download = Some(pulled.clone());

        let chunks: Vec<Result<Bytes, std::io::Error>> = content
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(stream::iter(chunks)
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn create_from_stream(
        &self,
        access_token: &str,
        file: &NewFile,
        mut body: ByteStream,
    ) -> Result<String, AppError> {
        let (drive, download) = {
            let mut s = self.state.lock().unwrap();
            s.calls.create += 1;
            (Self::drive_for(&s, access_token)?, s.last_download.take())
        };

        let mut trace = RelayTrace {
            pulled_before_upload: download
                .as_ref()
                .map_or(0, |d| d.load(Ordering::SeqCst)),
            pulled_per_chunk: Vec::new(),
        };

        let mut content = Vec::new();
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?
        {
            if let Some(d) = &download {
                trace.pulled_per_chunk.push(d.load(Ordering::SeqCst));
            }
            content.extend_from_slice(&chunk);
        }

        let mut s = self.state.lock().unwrap();
        if download.is_some() {
            s.relay_trace = Some(trace);
        }
        s.next_id += 1;
        let id = format!("new{}", s.next_id);
        s.drives.entry(drive).or_default().insert(
            id.clone(),
            FakeFile {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                content,
            },
        );
        Ok(id)
    }

    async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<(), AppError> {
        let mut s = self.state.lock().unwrap();
        s.calls.delete += 1;
        if s.fail_delete {
            return Err(AppError::GoogleApi("Google API returned 500".to_string()));
        }
        let drive = Self::drive_for(&s, access_token)?;
        s.drives
            .get_mut(&drive)
            .and_then(|files| files.remove(file_id))
            .map(|_| ())
            .ok_or_else(not_found)
    }
}

/// Memory store that yields before every call, like a networked backend.
pub struct YieldingStore {
    inner: MemoryDb,
}

#[async_trait]
impl Store for YieldingStore {
    async fn get_user_by_client_id(&self, client_id: &str) -> Result<Option<User>, AppError> {
        tokio::task::yield_now().await;
        self.inner.get_user_by_client_id(client_id).await
    }

    async fn get_or_create_user(&self, client_id: &str) -> Result<User, AppError> {
        tokio::task::yield_now().await;
        self.inner.get_or_create_user(client_id).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<LinkedAccount>, AppError> {
        tokio::task::yield_now().await;
        self.inner.get_account(account_id).await
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, AppError> {
        tokio::task::yield_now().await;
        self.inner.list_accounts(user_id).await
    }

    async fn upsert_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        self.inner.upsert_account(account).await
    }

    async fn update_tokens(
        &self,
        account_id: &str,
        update: &TokenUpdate,
    ) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        self.inner.update_tokens(account_id, update).await
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        self.inner.delete_account(account_id).await
    }
}

/// Test harness: app state over a memory store and the fake provider.
pub struct TestEnv {
    pub google: Arc<FakeGoogle>,
    pub store: MemoryDb,
    pub state: Arc<AppState>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, false)
    }

    /// Store calls yield to the scheduler first, so joined futures interleave.
    pub fn networked() -> Self {
        Self::build(Config::default(), true)
    }

    fn build(config: Config, yielding: bool) -> Self {
        let google = FakeGoogle::new();
        let store = MemoryDb::new();
        let backend: Arc<dyn Store> = if yielding {
            Arc::new(YieldingStore {
                inner: store.clone(),
            })
        } else {
            Arc::new(store.clone())
        };
        let state = Arc::new(AppState::new(config, backend, google.clone()));
        Self {
            google,
            store,
            state,
        }
    }

    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    pub fn client_token(&self, client_id: &str) -> String {
        create_client_token(client_id, &self.state.config.client_token_key).unwrap()
    }

    /// Link an account for `client_id` whose token opens `drive`.
    ///
    /// The access token is `<drive>-access`, the refresh token
    /// `<drive>-refresh`, and the token expires at `expiry`.
    pub async fn link(
        &self,
        client_id: &str,
        drive: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> LinkedAccount {
        let user = self.store.get_or_create_user(client_id).await.unwrap();
        let access_token = format!("{}-access", drive);
        self.google.grant(drive, &access_token);

        let provider_account_id = format!("gid-{}", drive);
        let account = LinkedAccount {
            id: account_id_for_provider(PROVIDER_GOOGLE, &provider_account_id),
            owner_user_id: user.id,
            provider: PROVIDER_GOOGLE.to_string(),
            provider_account_id,
            email: format!("{}@example.com", drive),
            display_name: Some(drive.to_string()),
            access_token,
            refresh_token: Some(format!("{}-refresh", drive)),
            token_expiry: expiry,
            created_at: Utc::now(),
        };
        self.store.upsert_account(&account).await.unwrap();
        account
    }

    /// Link an account whose access token has already expired.
    ///
    /// Refreshing yields `<drive>-fresh`.
    pub async fn link_expired(&self, client_id: &str, drive: &str) -> LinkedAccount {
        let account = self
            .link(client_id, drive, Some(Utc::now() - Duration::minutes(1)))
            .await;
        self.google.grant_refresh(
            drive,
            account.refresh_token.as_deref().unwrap(),
            &format!("{}-fresh", drive),
            None,
        );
        account
    }
}

/// Token expiry comfortably in the future.
pub fn valid_expiry() -> Option<DateTime<Utc>> {
    Some(Utc::now() + Duration::hours(1))
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Offline config whose OAuth client is absent.
pub fn config_without_oauth() -> Config {
    Config {
        google_oauth: None,
        ..Config::default()
    }
}

/// Convenience for stores held behind the trait.
pub async fn stored_account(store: &dyn Store, account_id: &str) -> Option<LinkedAccount> {
    store.get_account(account_id).await.unwrap()
}
