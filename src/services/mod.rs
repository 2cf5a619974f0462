// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod drive;
pub mod google;
pub mod oauth;
pub mod session;
pub mod token_cipher;
pub mod transfer;

pub use accounts::AccountResolver;
pub use drive::DriveService;
pub use google::{ByteStream, GoogleApi, GoogleClient, GoogleProfile, TokenResponse};
pub use oauth::OAuthService;
pub use session::{Credentials, DriveSession, SessionManager};
pub use token_cipher::TokenCipher;
pub use transfer::{TransferAction, TransferOutcome, TransferRequest, TransferService};
