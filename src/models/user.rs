//! User and linked-account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name for Google accounts.
pub const PROVIDER_GOOGLE: &str = "google";

/// Pseudonymous user, created lazily on first account link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID (also used as document ID)
    pub id: String,
    /// Opaque client identifier carried in the client token
    pub client_id: String,
    /// When the user was created (ISO 8601)
    pub created_at: String,
}

/// A third-party account linked to a user, with its OAuth tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub id: String,
    pub owner_user_id: String,
    /// Always "google" today
    pub provider: String,
    /// Google's stable account ID
    pub provider_account_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Replacement token values written after a refresh.
///
/// Applied as a whole: access token and expiry always overwrite the stored
/// pair. The refresh token is only written when the provider rotated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: String,
    pub token_expiry: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}
