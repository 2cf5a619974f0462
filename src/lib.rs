// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drive-Relay: move files between linked Google Drive accounts
//!
//! This crate provides the backend API for linking several Google accounts
//! to one pseudonymous client, browsing each Drive, and copying or moving
//! a file from one account to another by streaming it between sessions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::{
    AccountResolver, DriveService, GoogleApi, OAuthService, SessionManager, TransferService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub accounts: AccountResolver,
    pub sessions: SessionManager,
    pub drive: DriveService,
    pub transfers: TransferService,
    pub oauth: OAuthService,
}

impl AppState {
    /// Wire the services around a store and a Google API implementation.
    pub fn new(config: Config, store: Arc<dyn Store>, google: Arc<dyn GoogleApi>) -> Self {
        let accounts = AccountResolver::new(store.clone());
        let sessions = SessionManager::new(
            google.clone(),
            store.clone(),
            config.google_oauth.clone(),
        );

        Self {
            drive: DriveService::new(accounts.clone(), sessions.clone()),
            transfers: TransferService::new(accounts.clone(), sessions.clone()),
            oauth: OAuthService::new(google, store.clone(), config.google_oauth.clone()),
            config,
            store,
            accounts,
            sessions,
        }
    }
}
