// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Persistent user directory: the `User` record and the repository trait
//! that abstracts its storage.

pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RelayError;

/// A registered user. `id` is immutable once assigned; `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Protected-password form: hex salt followed by hex KDF digest.
    pub password: String,
    pub require_change_password: bool,
    /// Current refresh-token id, if the user has an active session.
    pub refresh_token_id: Option<String>,
}

impl User {
    /// Construct a new user with a freshly generated `user-<uuid v4>` id.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: format!("user-{}", Uuid::new_v4()),
            name: name.into(),
            password: password.into(),
            require_change_password: false,
            refresh_token_id: None,
        }
    }
}

/// Storage abstraction for the user directory.
///
/// Every method but [`Self::compare_and_update`] is a single statement and
/// needs no transaction scope of its own. Handlers that read a row and
/// write it back based on what they read (login, refresh, password
/// change) must go through `compare_and_update` instead of a bare
/// `update`, so the write can't silently clobber a concurrent change to
/// the same row.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), RelayError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RelayError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RelayError>;
    async fn find_by_refresh_token_id(&self, refresh_token_id: &str) -> Result<Option<User>, RelayError>;
    async fn list(&self) -> Result<Vec<User>, RelayError>;
    async fn update(&self, user: &User) -> Result<(), RelayError>;
    async fn delete(&self, id: &str) -> Result<(), RelayError>;

    /// Persist `user` only if the stored row still matches `expected`
    /// field-for-field. Gives read-then-write call sites (login,
    /// refresh, update_password) an atomic write without a long-lived
    /// transaction: the read and the decision of what to write can
    /// happen anywhere in the handler, but the write only lands if
    /// nothing else committed to the row in between. Fails with
    /// `ErrorCode::OptimisticLock` if the row has moved on.
    async fn compare_and_update(&self, expected: &User, user: &User) -> Result<(), RelayError>;
}
