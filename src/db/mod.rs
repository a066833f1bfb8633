//! Database layer: credential store and refresh token store.
//!
//! Both stores are traits so the session service can run against
//! Postgres in production and against [`MemoryStore`] in tests and
//! local development.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{NewRefreshToken, NewUser, StoredRefreshToken, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Columns protected by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Phone,
    RefreshToken,
}

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write collided with an existing row. This is the
    /// authoritative duplicate signal; lookups done before an insert are
    /// advisory only.
    #[error("Unique constraint violated: {0:?}")]
    Conflict(UniqueField),

    #[error("Database error: {0}")]
    Database(String),
}

/// Persists user identity, password hash and role.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;

    /// Match `identifier` against email first, then phone.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with [`StoreError::Conflict`] when the email
    /// or phone is already taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError>;
}

/// Persists issued refresh tokens so they can be revoked.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: NewRefreshToken) -> Result<StoredRefreshToken, StoreError>;

    /// Atomically remove a token by digest and return it. A token can be
    /// taken at most once.
    async fn take(&self, token_hash: &str) -> Result<Option<StoredRefreshToken>, StoreError>;

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError>;

    async fn delete_by_user_and_token(
        &self,
        user_id: i64,
        token_hash: &str,
    ) -> Result<u64, StoreError>;

    /// Remove tokens whose `expires_at` is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
