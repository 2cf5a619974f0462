// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session acquisition and token persistence tests.

use chrono::{Duration, Utc};
use drive_relay::db::Store;
use drive_relay::error::AppError;
use futures_util::future::join_all;
use std::collections::HashSet;

mod common;
use common::{config_without_oauth, valid_expiry, TestEnv};

const CLIENT: &str = "client-1";

#[tokio::test]
async fn test_valid_token_used_without_refresh_or_write() {
    let env = TestEnv::new();
    let account = env.link(CLIENT, "alpha", valid_expiry()).await;

    let session = env
        .state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap();

    assert_eq!(session.credentials().access_token, "alpha-access");
    assert_eq!(env.google.calls().refresh, 0);

    let stored = env.store.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, account.access_token);
    assert_eq!(stored.token_expiry, account.token_expiry);
}

#[tokio::test]
async fn test_expired_token_refreshed_and_persisted() {
    let env = TestEnv::new();
    let account = env.link_expired(CLIENT, "alpha").await;
    let before = Utc::now();

    let session = env
        .state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap();

    assert_eq!(session.credentials().access_token, "alpha-fresh");
    assert_eq!(env.google.calls().refresh, 1);

    let stored = env.store.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "alpha-fresh");
    let expiry = stored.token_expiry.unwrap();
    assert!(expiry > before + Duration::minutes(55));
    // Refresh token was not rotated, so the original stays.
    assert_eq!(stored.refresh_token.as_deref(), Some("alpha-refresh"));

    // The refreshed session can actually use the drive.
    assert!(session.list_files(None).await.is_ok());
}

#[tokio::test]
async fn test_token_near_expiry_refreshed() {
    let env = TestEnv::new();
    let account = env
        .link(CLIENT, "alpha", Some(Utc::now() + Duration::minutes(2)))
        .await;
    env.google
        .grant_refresh("alpha", "alpha-refresh", "alpha-fresh", None);

    env.state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap();

    assert_eq!(env.google.calls().refresh, 1);
}

#[tokio::test]
async fn test_unknown_expiry_treated_as_valid() {
    let env = TestEnv::new();
    let account = env.link(CLIENT, "alpha", None).await;

    env.state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap();

    assert_eq!(env.google.calls().refresh, 0);
}

#[tokio::test]
async fn test_rotated_refresh_token_persisted() {
    let env = TestEnv::new();
    let account = env
        .link(CLIENT, "alpha", Some(Utc::now() - Duration::minutes(1)))
        .await;
    env.google
        .grant_refresh("alpha", "alpha-refresh", "alpha-fresh", Some("alpha-refresh-2"));

    env.state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap();

    let stored = env.store.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("alpha-refresh-2"));
}

#[tokio::test]
async fn test_revoked_refresh_token_leaves_store_untouched() {
    let env = TestEnv::new();
    let account = env.link_expired(CLIENT, "alpha").await;
    env.google.revoke("alpha-refresh");

    let err = env
        .state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RefreshFailed(_)));

    let stored = env.store.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, account.access_token);
    assert_eq!(stored.token_expiry, account.token_expiry);
    assert_eq!(stored.refresh_token, account.refresh_token);
}

#[tokio::test]
async fn test_missing_refresh_token_fails() {
    let env = TestEnv::new();
    let mut account = env.link_expired(CLIENT, "alpha").await;
    account.refresh_token = None;
    env.store.upsert_account(&account).await.unwrap();

    let err = env
        .state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RefreshFailed(_)));
    assert_eq!(env.google.calls().refresh, 0);
}

#[tokio::test]
async fn test_missing_oauth_config() {
    let env = TestEnv::with_config(config_without_oauth());
    let account = env.link(CLIENT, "alpha", valid_expiry()).await;

    let err = env
        .state
        .sessions
        .acquire_session(&account.owner_user_id, &account.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ConfigMissing));
}

#[tokio::test]
async fn test_wrong_owner_not_found() {
    let env = TestEnv::new();
    let account = env.link(CLIENT, "alpha", valid_expiry()).await;
    let intruder = env.store.get_or_create_user("client-2").await.unwrap();

    let err = env
        .state
        .sessions
        .acquire_session(&intruder.id, &account.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_refreshes_store_one_consistent_token() {
    let env = TestEnv::networked();
    let account = env.link_expired(CLIENT, "alpha").await;
    env.google.set_numbered_refresh(true);

    let results = join_all((0..4).map(|_| {
        env.state
            .sessions
            .acquire_session(&account.owner_user_id, &account.id)
    }))
    .await;

    let sessions: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    let issued: HashSet<&str> = sessions
        .iter()
        .map(|s| s.credentials().access_token.as_str())
        .collect();
    assert!(issued.len() > 1, "refreshes should have interleaved");

    // Token and expiry must come from the same refresh response.
    let stored = env.store.get_account(&account.id).await.unwrap().unwrap();
    assert!(sessions.iter().any(|s| {
        s.credentials().access_token == stored.access_token
            && s.credentials().expires_at == stored.token_expiry
    }));
    assert_eq!(stored.refresh_token.as_deref(), Some("alpha-refresh"));
}
