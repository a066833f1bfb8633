// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and credential lifecycle.
//!
//! Orchestrates the credential store, the refresh token store, the OTP
//! registry and the token issuer:
//! - Registration and password login
//! - OTP login, which provisions a placeholder account on first use
//! - Refresh token rotation
//! - Logout, password change and password reset (the latter two revoke
//!   every stored refresh token of the user)

use crate::db::{RefreshTokenStore, StoreError, UniqueField, UserStore};
use crate::models::{NewRefreshToken, NewUser, Role, User};
use crate::services::delivery::{mask_phone, OtpSender};
use crate::services::otp::{OtpError, OtpPurpose, OtpRegistry};
use crate::services::password::{PasswordError, PasswordHasher};
use crate::services::token::{fingerprint, Claims, IssuedToken, TokenError, TokenIssuer};
use chrono::Utc;
use std::sync::Arc;
use validator::ValidateEmail;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Domain of the synthetic email given to accounts created by OTP login.
const PHONE_EMAIL_DOMAIN: &str = "phone.local";

/// Failures of the session flows.
///
/// Authentication failures carry no detail about which
/// check failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired otp code")]
    InvalidOtp,

    #[error("current password is incorrect")]
    InvalidPassword,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("email already exists")]
    EmailExists,

    #[error("phone already exists")]
    PhoneExists,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("{0}")]
    Internal(String),
}

impl From<OtpError> for AuthError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidOrExpired => AuthError::InvalidOtp,
            OtpError::RandomUnavailable => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidOrExpired => AuthError::InvalidToken,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

/// Map an insert conflict to the matching duplicate error.
fn conflict_error(err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict(UniqueField::Email) => AuthError::EmailExists,
        StoreError::Conflict(UniqueField::Phone) => AuthError::PhoneExists,
        other => AuthError::Store(other),
    }
}

fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Placeholder email for an account created by OTP login.
fn synthetic_email(phone: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("{}.{}@{}", phone, tag, PHONE_EMAIL_DOMAIN),
        None => format!("{}@{}", phone, PHONE_EMAIL_DOMAIN),
    }
    .to_lowercase()
}

fn phone_user(phone: &str, email: String) -> NewUser {
    NewUser {
        name: phone.to_string(),
        email,
        phone: phone.to_string(),
        password_hash: None,
        role: Role::Student,
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// A user together with a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

/// Result of an OTP login. `provisioned` is true when the account was
/// created by this login.
#[derive(Debug, Clone)]
pub struct OtpLogin {
    pub auth: AuthResult,
    pub provisioned: bool,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    otp: Arc<OtpRegistry>,
    sender: Arc<dyn OtpSender>,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        otp: Arc<OtpRegistry>,
        sender: Arc<dyn OtpSender>,
        tokens: TokenIssuer,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            otp,
            sender,
            tokens,
            hasher,
        }
    }

    pub fn otp_registry(&self) -> &OtpRegistry {
        &self.otp
    }

    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    // ─── Registration & Login ────────────────────────────────────

    pub async fn register(&self, input: RegisterInput) -> Result<AuthResult, AuthError> {
        let name = input.name.trim().to_string();
        let email = input.email.trim().to_lowercase();
        let phone = input.phone.trim().to_string();

        if name.is_empty() || email.is_empty() || phone.is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation(
                "name, email, phone and password are required".to_string(),
            ));
        }
        if !email.validate_email() {
            return Err(AuthError::Validation("email is not valid".to_string()));
        }
        validate_new_password(&input.password)?;

        // Advisory only: a concurrent registration can still slip past
        // these lookups, and then the insert conflict below decides.
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }
        if self.users.find_by_phone(&phone).await?.is_some() {
            return Err(AuthError::PhoneExists);
        }

        let password_hash = self.hasher.hash_blocking(input.password).await?;

        let user = self
            .users
            .create(NewUser {
                name,
                email,
                phone,
                password_hash: Some(password_hash),
                role: Role::Student,
            })
            .await
            .map_err(conflict_error)?;

        tracing::info!(user_id = user.id, "User registered");
        self.issue_session(user).await
    }

    /// Password login by email or phone. Every failure is the same
    /// `InvalidCredentials`.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.users.find_by_identifier(&identifier).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());
        let matches = self
            .hasher
            .verify_blocking(password.to_string(), stored_hash)
            .await?;

        match user {
            Some(user) if matches => {
                tracing::info!(user_id = user.id, "Password login");
                self.issue_session(user).await
            }
            _ => {
                tracing::debug!("Password login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    // ─── OTP Login ───────────────────────────────────────────────

    /// Issue and deliver a login code. Does not reveal whether the phone
    /// belongs to an account.
    pub async fn request_otp(&self, phone: &str) -> Result<(), AuthError> {
        self.send_code(phone, OtpPurpose::Login).await
    }

    /// Consume a login code and sign in, creating the account on first
    /// use.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<OtpLogin, AuthError> {
        let phone = phone.trim();
        let code = code.trim();
        if phone.is_empty() || code.is_empty() {
            return Err(AuthError::InvalidOtp);
        }

        self.otp.verify_and_consume(phone, OtpPurpose::Login, code)?;

        let (user, provisioned) = match self.users.find_by_phone(phone).await? {
            Some(user) => (user, false),
            None => self.provision_phone_user(phone).await?,
        };

        if provisioned {
            tracing::info!(user_id = user.id, phone = %mask_phone(phone), "Provisioned user via OTP");
        }

        let auth = self.issue_session(user).await?;
        Ok(OtpLogin { auth, provisioned })
    }

    async fn provision_phone_user(&self, phone: &str) -> Result<(User, bool), AuthError> {
        match self.users.create(phone_user(phone, synthetic_email(phone, None))).await {
            Ok(user) => Ok((user, true)),
            Err(StoreError::Conflict(field)) => {
                // Lost a race with another request for the same phone.
                if let Some(user) = self.users.find_by_phone(phone).await? {
                    return Ok((user, false));
                }
                if field != UniqueField::Email {
                    return Err(conflict_error(StoreError::Conflict(field)));
                }

                // Another account registered the synthetic address as its
                // real email.
                let tag = uuid::Uuid::new_v4().simple().to_string();
                let email = synthetic_email(phone, Some(&tag[..8]));
                let user = self
                    .users
                    .create(phone_user(phone, email))
                    .await
                    .map_err(conflict_error)?;
                Ok((user, true))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ─── Tokens ──────────────────────────────────────────────────

    /// Verify an access token. Stateless: no store lookup.
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        Ok(self.tokens.verify_access_token(access_token)?)
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// consumed, so each refresh token works once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let claims = self.tokens.verify_refresh_token(refresh_token.trim())?;
        let user_id = claims.user_id()?;

        let stored = self
            .refresh_tokens
            .take(&fingerprint(refresh_token.trim()))
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if stored.user_id != user_id || stored.expires_at <= Utc::now() {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        tracing::debug!(user_id, "Refresh token rotated");
        self.issue_session(user).await
    }

    /// Revoke one refresh token, or all of the user's when none is given.
    /// Revoking an absent token is not an error.
    pub async fn logout(&self, user_id: i64, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let revoked = match refresh_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => {
                self.refresh_tokens
                    .delete_by_user_and_token(user_id, &fingerprint(token))
                    .await?
            }
            None => self.refresh_tokens.delete_by_user(user_id).await?,
        };

        tracing::info!(user_id, revoked, "User logged out");
        Ok(())
    }

    pub async fn current_user(&self, user_id: i64) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Look up any account by id (admin view).
    pub async fn user_by_id(&self, user_id: i64) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // ─── Password Management ─────────────────────────────────────

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_new_password(new_password)?;

        let user = self.current_user(user_id).await?;
        let matches = self
            .hasher
            .verify_blocking(current_password.to_string(), user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AuthError::InvalidPassword);
        }

        self.set_password_and_revoke(user.id, new_password).await
    }

    /// Issue and deliver a password reset code.
    pub async fn request_password_reset(&self, phone: &str) -> Result<(), AuthError> {
        self.send_code(phone, OtpPurpose::PasswordReset).await
    }

    pub async fn reset_password_with_otp(
        &self,
        phone: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let phone = phone.trim();
        let code = code.trim();
        if phone.is_empty() || code.is_empty() {
            return Err(AuthError::InvalidOtp);
        }
        // Checked before consuming so a rejected password keeps the code.
        validate_new_password(new_password)?;

        self.otp
            .verify_and_consume(phone, OtpPurpose::PasswordReset, code)?;

        let user = self
            .users
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.set_password_and_revoke(user.id, new_password).await
    }

    // ─── Maintenance ─────────────────────────────────────────────

    /// Drop expired OTP entries and expired stored refresh tokens.
    pub async fn purge_expired(&self) -> Result<(), AuthError> {
        let now = Utc::now();
        let codes = self.otp.purge_expired_at(now);
        let tokens = self.refresh_tokens.delete_expired(now).await?;

        if codes > 0 || tokens > 0 {
            tracing::info!(codes, tokens, "Purged expired credentials");
        }
        Ok(())
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn send_code(&self, phone: &str, purpose: OtpPurpose) -> Result<(), AuthError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AuthError::Validation("phone is required".to_string()));
        }

        let code = self.otp.issue(phone, purpose)?;
        self.sender
            .send(phone, &code, purpose)
            .await
            .map_err(|e| AuthError::Internal(format!("OTP delivery failed: {}", e)))
    }

    async fn set_password_and_revoke(&self, user_id: i64, password: &str) -> Result<(), AuthError> {
        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;
        self.users.update_password(user_id, &password_hash).await?;
        let revoked = self.refresh_tokens.delete_by_user(user_id).await?;

        tracing::info!(user_id, revoked, "Password updated, refresh tokens revoked");
        Ok(())
    }

    async fn issue_session(&self, user: User) -> Result<AuthResult, AuthError> {
        let access_token = self.tokens.issue_access_token(user.id, user.role)?;
        let refresh_token = self.tokens.issue_refresh_token(user.id, user.role)?;

        self.refresh_tokens
            .create(NewRefreshToken {
                user_id: user.id,
                token_hash: fingerprint(&refresh_token.token),
                expires_at: refresh_token.expires_at,
            })
            .await?;

        Ok(AuthResult {
            user,
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_new_password_length() {
        assert!(validate_new_password("1234567").is_err());
        assert!(validate_new_password("12345678").is_ok());
    }

    #[test]
    fn test_conflict_error_mapping() {
        assert!(matches!(
            conflict_error(StoreError::Conflict(UniqueField::Email)),
            AuthError::EmailExists
        ));
        assert!(matches!(
            conflict_error(StoreError::Conflict(UniqueField::Phone)),
            AuthError::PhoneExists
        ));
        assert!(matches!(
            conflict_error(StoreError::Database("boom".to_string())),
            AuthError::Store(_)
        ));
    }

    #[test]
    fn test_synthetic_email() {
        assert_eq!(synthetic_email("0912", None), "0912@phone.local");
        assert_eq!(synthetic_email("0912", Some("AB12")), "0912.ab12@phone.local");
    }

    #[test]
    fn test_otp_error_mapping() {
        assert!(matches!(
            AuthError::from(OtpError::InvalidOrExpired),
            AuthError::InvalidOtp
        ));
        assert!(matches!(
            AuthError::from(TokenError::InvalidOrExpired),
            AuthError::InvalidToken
        ));
    }
}
