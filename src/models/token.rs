//! Persisted refresh token rows.

use chrono::{DateTime, Utc};

/// A refresh token as it lives in the store. Only the SHA-256 digest of
/// the signed token is kept.
#[derive(Debug, Clone)]
pub struct StoredRefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
