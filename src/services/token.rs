// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed access and refresh tokens.
//!
//! Both kinds are HS256 JWTs carrying `{sub, role, kind, iat, exp, jti}`.
//! Access tokens are verified statelessly. Refresh tokens are also
//! persisted (as a SHA-256 digest, see [`fingerprint`]) so they can be
//! revoked.

use crate::config::Config;
use crate::models::Role;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which of the two token kinds a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::InvalidOrExpired)
    }
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Every verification failure (bad structure, bad signature, expired,
    /// wrong kind) collapses to this one value.
    #[error("Invalid or expired token")]
    InvalidOrExpired,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Mints and verifies tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn issue_access_token(&self, user_id: i64, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Access, user_id, role, Utc::now())
    }

    pub fn issue_refresh_token(
        &self,
        user_id: i64,
        role: Role,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Refresh, user_id, role, Utc::now())
    }

    /// Sign a token as if issued at `now`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        user_id: i64,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::InvalidOrExpired)?
            .claims;

        if claims.kind != expected {
            return Err(TokenError::InvalidOrExpired);
        }
        claims.user_id()?;

        Ok(claims)
    }
}

/// Hex SHA-256 digest of a token, the form in which refresh tokens are
/// stored.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &[u8]) -> TokenIssuer {
        TokenIssuer::new(secret, Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer(b"test_signing_key_32_bytes_long!!");
        let issued = issuer.issue_access_token(42, Role::Admin).unwrap();

        let claims = issuer.verify_access_token(&issued.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let issuer = issuer(b"test_signing_key_32_bytes_long!!");
        let issued = issuer.issue_refresh_token(7, Role::Student).unwrap();

        let claims = issuer.verify_refresh_token(&issued.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let issuer = issuer(b"test_signing_key_32_bytes_long!!");
        let access = issuer.issue_access_token(1, Role::Student).unwrap();
        let refresh = issuer.issue_refresh_token(1, Role::Student).unwrap();

        assert_eq!(
            issuer.verify_refresh_token(&access.token).unwrap_err(),
            TokenError::InvalidOrExpired
        );
        assert_eq!(
            issuer.verify_access_token(&refresh.token).unwrap_err(),
            TokenError::InvalidOrExpired
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer(b"test_signing_key_32_bytes_long!!");
        let issued = issuer
            .issue_at(
                TokenKind::Access,
                1,
                Role::Student,
                Utc::now() - Duration::minutes(16),
            )
            .unwrap();

        assert_eq!(
            issuer.verify_access_token(&issued.token).unwrap_err(),
            TokenError::InvalidOrExpired
        );
    }

    #[test]
    fn test_wrong_secret_and_garbage_fail_uniformly() {
        let issuer_a = issuer(b"secret_a_secret_a_secret_a_secret");
        let issuer_b = issuer(b"secret_b_secret_b_secret_b_secret");
        let token = issuer_a.issue_access_token(1, Role::Student).unwrap();

        let wrong_secret = issuer_b.verify_access_token(&token.token).unwrap_err();
        let garbage = issuer_b.verify_access_token("invalid.token.here").unwrap_err();
        assert_eq!(wrong_secret, garbage);
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer(b"test_signing_key_32_bytes_long!!");
        let a = issuer.issue_refresh_token(1, Role::Student).unwrap();
        let b = issuer.issue_refresh_token(1, Role::Student).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(fingerprint(&a.token), fingerprint(&b.token));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let digest = fingerprint("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
