// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and credential routes.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Role, User};
use crate::services::session::{AuthResult, RegisterInput};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Routes reachable without a token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login/password", post(login_password))
        .route("/auth/otp/request", post(request_otp))
        .route("/auth/otp/verify", post(verify_otp))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot/send-otp", post(forgot_send_otp))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes that require a valid access token.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
}

/// Routes for admins. `require_auth` and `require_admin` are applied in
/// routes/mod.rs.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/users/{id}", get(admin_get_user))
}

/// Unwrap a JSON body and run its validation rules.
fn validated<T: Validate>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    let Json(body) = payload?;
    body.validate()?;
    Ok(body)
}

// ─── Responses ───────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            height_cm: user.height_cm,
            weight_kg: user.weight_kg,
            created_at: format_utc_rfc3339(user.created_at),
            updated_at: format_utc_rfc3339(user.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub access_token_expires_at: String,
    pub refresh_token: String,
    pub refresh_token_expires_at: String,
}

impl From<AuthResult> for AuthResponse {
    fn from(auth: AuthResult) -> Self {
        Self {
            user: auth.user.into(),
            access_token: auth.access_token.token,
            access_token_expires_at: format_utc_rfc3339(auth.access_token.expires_at),
            refresh_token: auth.refresh_token.token,
            refresh_token_expires_at: format_utc_rfc3339(auth.refresh_token.expires_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpLoginResponse {
    #[serde(flatten)]
    pub auth: AuthResponse,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// ─── Registration & Login ────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let req = validated(payload)?;

    let auth = state
        .session
        .register(RegisterInput {
            name: req.name,
            email: req.email,
            phone: req.phone,
            password: req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(auth.into())))
}

/// Missing fields are treated as empty so every login failure is the
/// same 401.
#[derive(Debug, Deserialize)]
pub struct PasswordLoginRequest {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

async fn login_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PasswordLoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(req) = payload?;

    let auth = state
        .session
        .login_with_password(&req.identifier, &req.password)
        .await?;

    Ok(Json(auth.into()))
}

// ─── OTP Login ───────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct PhoneRequest {
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

async fn request_otp(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;
    state.session.request_otp(&req.phone).await?;
    Ok(message("otp sent"))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub code: String,
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<OtpLoginResponse>> {
    let Json(req) = payload?;

    let login = state.session.verify_otp(&req.phone, &req.code).await?;

    Ok(Json(OtpLoginResponse {
        auth: login.auth.into(),
        is_new_user: login.provisioned,
    }))
}

// ─── Tokens ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(req) = payload?;
    let auth = state.session.refresh(&req.refresh_token).await?;
    Ok(Json(auth.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Revoke one refresh token, or all of them when the body names none.
/// The body is optional.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    state
        .session
        .logout(user.user_id, req.refresh_token.as_deref())
        .await?;

    Ok(message("logged out"))
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = state.session.current_user(user.user_id).await?;
    Ok(Json(user.into()))
}

async fn admin_get_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>> {
    let user = state.session.user_by_id(user_id).await?;
    tracing::info!(admin_id = admin.user_id, user_id, "Admin viewed user");
    Ok(Json(user.into()))
}

// ─── Password Management ─────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;

    state
        .session
        .change_password(user.user_id, &req.current_password, &req.new_password)
        .await?;

    Ok(message("password updated"))
}

async fn forgot_send_otp(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;
    state.session.request_password_reset(&req.phone).await?;
    Ok(message("otp sent"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub code: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;

    state
        .session
        .reset_password_with_otp(&req.phone, &req.code, &req.new_password)
        .await?;

    Ok(message("password updated"))
}
