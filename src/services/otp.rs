// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time numeric codes for phone login and password reset.
//!
//! At most one live code exists per `(phone, purpose)`; issuing a new one
//! overwrites the old. Verification checks and removes the entry under
//! the same shard lock (`DashMap::remove_if`), so a code can be consumed
//! at most once even when verifications race. Expired entries are
//! treated as absent. They are swept every [`PURGE_EVERY`] issues and by
//! the periodic maintenance task, so the map does not grow with every
//! phone that ever asked for a code.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::atomic::{AtomicUsize, Ordering};
use subtle::ConstantTimeEq;

/// Largest multiple of 1_000_000 that fits in a u32, for rejection sampling.
const CODE_SAMPLE_LIMIT: u32 = 4_294_000_000;

/// Expired entries are swept on every this many issued codes.
pub const PURGE_EVERY: usize = 64;

/// What a code may be used for. Codes never cross purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    Login,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("invalid or expired otp code")]
    InvalidOrExpired,

    #[error("secure random source unavailable")]
    RandomUnavailable,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// In-process registry of outstanding codes.
pub struct OtpRegistry {
    entries: DashMap<(String, OtpPurpose), OtpEntry>,
    ttl: Duration,
    rng: SystemRandom,
    issued: AtomicUsize,
}

impl OtpRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            rng: SystemRandom::new(),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate and store a fresh code, replacing any outstanding one.
    pub fn issue(&self, phone: &str, purpose: OtpPurpose) -> Result<String, OtpError> {
        self.issue_at(phone, purpose, Utc::now())
    }

    pub fn issue_at(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<String, OtpError> {
        let code = generate_code(&self.rng)?;

        if self.issued.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let purged = self.purge_expired_at(now);
            if purged > 0 {
                tracing::debug!(purged, "Purged expired OTP entries");
            }
        }

        self.entries.insert(
            (phone.to_string(), purpose),
            OtpEntry {
                code: code.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(code)
    }

    /// Check a code and remove it on success.
    pub fn verify_and_consume(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), OtpError> {
        self.verify_and_consume_at(phone, purpose, code, Utc::now())
    }

    pub fn verify_and_consume_at(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let key = (phone.to_string(), purpose);
        self.entries
            .remove_if(&key, |_, entry| {
                now < entry.expires_at && bool::from(entry.code.as_bytes().ct_eq(code.as_bytes()))
            })
            .map(|_| ())
            .ok_or(OtpError::InvalidOrExpired)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Uniform 6-digit code, zero padded.
fn generate_code(rng: &SystemRandom) -> Result<String, OtpError> {
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf).map_err(|_| OtpError::RandomUnavailable)?;
        let n = u32::from_be_bytes(buf);
        if n < CODE_SAMPLE_LIMIT {
            return Ok(format!("{:06}", n % 1_000_000));
        }
    }
}
