// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod drive;
pub mod user;

pub use drive::{DriveFile, DriveUsage, FileList, FileMetadata, NewFile};
pub use user::{LinkedAccount, TokenUpdate, User, PROVIDER_GOOGLE};
