// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encryption of OAuth tokens at rest.
//!
//! AES-256-GCM with a key derived from `TOKEN_ENCRYPTION_KEY` via
//! HKDF-SHA256. The account ID is bound as associated data, so a token
//! ciphertext copied onto another account's row will not decrypt.
//!
//! Stored format: base64(nonce || ciphertext || tag).

use crate::db::random_bytes;
use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use sha2::Sha256;
use std::sync::Arc;

const HKDF_SALT: &[u8] = b"drive-relay/token-cipher/v1";
const HKDF_INFO: &[u8] = b"oauth-token-encryption";

/// Token encryption service.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<LessSafeKey>,
}

impl TokenCipher {
    /// Derive the AEAD key from the configured secret.
    pub fn new(secret: &[u8]) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Token encryption key is empty"
            )));
        }

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {}", e)))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &okm)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid AES-256-GCM key")))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
        })
    }

    /// Encrypt a token for the given account.
    pub fn encrypt(&self, plaintext: &str, account_id: &str) -> Result<String, AppError> {
        let nonce_bytes: [u8; NONCE_LEN] = random_bytes()?;
        let mut in_out = plaintext.as_bytes().to_vec();

        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(account_id.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a token stored for the given account.
    pub fn decrypt(&self, ciphertext_b64: &str, account_id: &str) -> Result<String, AppError> {
        let sealed = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 token decode failed: {}", e))
        })?;

        if sealed.len() < NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Encrypted token too short"
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid token nonce")))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(account_id.as_bytes()), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token decryption failed")))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}
