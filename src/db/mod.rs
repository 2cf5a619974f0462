//! Database layer.
//!
//! The [`Store`] trait is the persistence seam for users and linked
//! accounts. Firestore backs production; the in-memory store backs local
//! runs and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{LinkedAccount, TokenUpdate, User};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const LINKED_ACCOUNTS: &str = "linked_accounts";
}

/// Persistence for users, linked accounts, and their OAuth tokens.
///
/// Token writes through [`Store::update_tokens`] replace the stored access
/// token and expiry as a unit, so concurrent refreshes of the same account
/// resolve to last-write-wins without mixing fields.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find the user for a client ID.
    async fn get_user_by_client_id(&self, client_id: &str) -> Result<Option<User>, AppError>;

    /// Find the user for a client ID, creating it if absent.
    async fn get_or_create_user(&self, client_id: &str) -> Result<User, AppError>;

    /// Get a linked account by ID.
    async fn get_account(&self, account_id: &str) -> Result<Option<LinkedAccount>, AppError>;

    /// List a user's linked accounts, oldest first.
    async fn list_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, AppError>;

    /// Create or fully replace a linked account.
    async fn upsert_account(&self, account: &LinkedAccount) -> Result<(), AppError>;

    /// Overwrite an account's tokens after a refresh.
    async fn update_tokens(&self, account_id: &str, update: &TokenUpdate)
        -> Result<(), AppError>;

    /// Delete a linked account.
    async fn delete_account(&self, account_id: &str) -> Result<(), AppError>;
}

/// Derive the user document ID from a client ID.
///
/// Deterministic so that get-or-create is an idempotent upsert even when
/// two callbacks for the same client race.
pub fn user_id_for_client(client_id: &str) -> String {
    let digest = Sha256::digest(client_id.as_bytes());
    hex::encode(&digest[..16])
}

/// Derive the linked account document ID from the provider identity.
///
/// One document per (provider, provider account), so concurrent links of
/// the same identity overwrite each other instead of creating duplicates.
pub fn account_id_for_provider(provider: &str, provider_account_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update([0u8]);
    hasher.update(provider_account_id.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Fill a fixed-size array from the system CSPRNG.
pub(crate) fn random_bytes<const N: usize>() -> Result<[u8; N], AppError> {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = [0u8; N];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(bytes)
}
