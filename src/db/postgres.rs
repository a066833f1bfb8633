// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres-backed stores.
//!
//! Uniqueness of email, phone and refresh token digest is enforced by
//! the schema (see `migrations/`). Unique violations are mapped to
//! [`StoreError::Conflict`] using the constraint name.

use crate::db::{RefreshTokenStore, StoreError, UniqueField, UserStore};
use crate::models::{NewRefreshToken, NewUser, StoredRefreshToken, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

const USER_COLUMNS: &str =
    "id, name, email, phone, password_hash, role, height_cm, weight_kg, created_at, updated_at";

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, created_at";

/// Postgres client implementing both store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres with a bounded pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        tracing::info!(max_connections, "Connected to Postgres");

        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {}", e)))?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    async fn fetch_user(&self, clause: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE {} LIMIT 1", USER_COLUMNS, clause);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(User::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
    password_hash: Option<String>,
    role: String,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e: crate::models::user::UnknownRole| StoreError::Database(e.to_string()))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            role,
            height_cm: row.height_cm,
            weight_kg: row.weight_kg,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<TokenRow> for StoredRefreshToken {
    fn from(row: TokenRow) -> Self {
        StoredRefreshToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// Translate driver errors, surfacing unique violations as conflicts.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("users_email_key") => return StoreError::Conflict(UniqueField::Email),
                Some("users_phone_key") => return StoreError::Conflict(UniqueField::Phone),
                Some("refresh_tokens_token_hash_key") => {
                    return StoreError::Conflict(UniqueField::RefreshToken)
                }
                _ => {}
            }
        }
    }
    StoreError::Database(err.to_string())
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("email = $1", email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("phone = $1", phone).await
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        // An email match wins over a phone match.
        self.fetch_user(
            "email = $1 OR phone = $1 ORDER BY (email = $1) DESC",
            identifier,
        )
        .await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (name, email, phone, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        User::try_from(row)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

// ─── Refresh Token Operations ────────────────────────────────

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create(&self, token: NewRefreshToken) -> Result<StoredRefreshToken, StoreError> {
        let sql = format!(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3) RETURNING {}",
            TOKEN_COLUMNS
        );
        let row: TokenRow = sqlx::query_as(&sql)
            .bind(token.user_id)
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn take(&self, token_hash: &str) -> Result<Option<StoredRefreshToken>, StoreError> {
        let sql = format!(
            "DELETE FROM refresh_tokens WHERE token_hash = $1 RETURNING {}",
            TOKEN_COLUMNS
        );
        let row: Option<TokenRow> = sqlx::query_as(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_by_user_and_token(
        &self,
        user_id: i64,
        token_hash: &str,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
                .bind(user_id)
                .bind(token_hash)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
