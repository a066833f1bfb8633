// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use fitstudio::db::{StoreError, UniqueField};
use fitstudio::error::AppError;
use fitstudio::services::AuthError;
use serde_json::Value;

async fn status_and_body(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_auth_errors_map_to_status_codes() {
    let cases = [
        (
            AuthError::Validation("phone is required".to_string()),
            StatusCode::BAD_REQUEST,
            "bad_request",
        ),
        (
            AuthError::InvalidCredentials,
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
        ),
        (AuthError::InvalidOtp, StatusCode::UNAUTHORIZED, "invalid_otp"),
        (
            AuthError::InvalidPassword,
            StatusCode::UNAUTHORIZED,
            "invalid_password",
        ),
        (AuthError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_token"),
        (AuthError::EmailExists, StatusCode::CONFLICT, "conflict"),
        (AuthError::PhoneExists, StatusCode::CONFLICT, "conflict"),
        (AuthError::UserNotFound, StatusCode::NOT_FOUND, "not_found"),
    ];

    for (err, expected_status, expected_code) in cases {
        let (status, body) = status_and_body(err.into()).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["error"], expected_code);
    }
}

#[tokio::test]
async fn test_validation_details_are_returned() {
    let err: AppError = AuthError::Validation("phone is required".to_string()).into();
    let (_, body) = status_and_body(err).await;

    assert_eq!(body["details"], "phone is required");
}

#[tokio::test]
async fn test_internal_errors_are_not_exposed() {
    let err: AppError =
        AuthError::Store(StoreError::Database("connection refused on 10.0.0.5".to_string()))
            .into();
    let (status, body) = status_and_body(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("details").is_none());
    assert!(!body.to_string().contains("10.0.0.5"));

    let err: AppError = AuthError::Internal("signing key rejected".to_string()).into();
    let (status, body) = status_and_body(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_unmapped_store_conflict_is_internal() {
    let err: AppError = AuthError::Store(StoreError::Conflict(UniqueField::RefreshToken)).into();
    let (status, _) = status_and_body(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unauthorized_has_no_details() {
    let (status, body) = status_and_body(AppError::Unauthorized).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_forbidden_has_no_details() {
    let (status, body) = status_and_body(AppError::Forbidden).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(body.get("details").is_none());
}
