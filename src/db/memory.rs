// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory stores for tests and local development.
//!
//! All state sits behind one lock so the uniqueness checks on insert are
//! atomic, matching the guarantees of the Postgres schema.

use crate::db::{RefreshTokenStore, StoreError, UniqueField, UserStore};
use crate::models::{NewRefreshToken, NewUser, StoredRefreshToken, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    next_user_id: i64,
    /// Keyed by token digest
    tokens: HashMap<String, StoredRefreshToken>,
    next_token_id: i64,
}

/// Process-local store implementing both store traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn find_user(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.values().find(|u| pred(u)).cloned())
    }

    /// Number of refresh tokens currently stored for a user.
    pub fn refresh_token_count(&self, user_id: i64) -> usize {
        self.read()
            .map(|inner| inner.tokens.values().filter(|t| t.user_id == user_id).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user(|u| u.email == email)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        self.find_user(|u| u.phone == phone)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        match self.find_user(|u| u.email == identifier)? {
            Some(user) => Ok(Some(user)),
            None => self.find_user(|u| u.phone == identifier),
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.write()?;

        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if inner.users.values().any(|u| u.phone == new_user.phone) {
            return Err(StoreError::Conflict(UniqueField::Phone));
        }

        inner.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_user_id,
            name: new_user.name,
            email: new_user.email,
            phone: new_user.phone,
            password_hash: new_user.password_hash,
            role: new_user.role,
            height_cm: None,
            weight_kg: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create(&self, token: NewRefreshToken) -> Result<StoredRefreshToken, StoreError> {
        let mut inner = self.write()?;

        if inner.tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Conflict(UniqueField::RefreshToken));
        }

        inner.next_token_id += 1;
        let stored = StoredRefreshToken {
            id: inner.next_token_id,
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        inner
            .tokens
            .insert(stored.token_hash.clone(), stored.clone());
        Ok(stored)
    }

    async fn take(&self, token_hash: &str) -> Result<Option<StoredRefreshToken>, StoreError> {
        Ok(self.write()?.tokens.remove(token_hash))
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn delete_by_user_and_token(
        &self,
        user_id: i64,
        token_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        match inner.tokens.get(token_hash) {
            Some(t) if t.user_id == user_id => {
                inner.tokens.remove(token_hash);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| t.expires_at > now);
        Ok((before - inner.tokens.len()) as u64)
    }
}
