// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT wire format tests.
//!
//! These tests decode issued tokens with plain `jsonwebtoken` and forge
//! tokens by hand, so a change to the claim layout or the accepted
//! algorithm is caught here.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use fitstudio::config::Config;
use fitstudio::models::Role;
use fitstudio::services::TokenIssuer;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

mod common;

/// Claim layout clients and other services rely on.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    role: String,
    kind: String,
    iat: i64,
    exp: i64,
    jti: String,
}

fn issuer() -> TokenIssuer {
    TokenIssuer::from_config(&Config::test_default())
}

fn forge(claims: &impl Serialize, algorithm: Algorithm, secret: &[u8]) -> String {
    encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("Failed to create JWT")
}

#[test]
fn test_issued_token_claim_layout() {
    let config = Config::test_default();
    let issued = issuer().issue_access_token(42, Role::Admin).unwrap();

    let decoded = decode::<WireClaims>(
        &issued.token,
        &DecodingKey::from_secret(&config.jwt_secret),
        &Validation::new(Algorithm::HS256),
    )
    .expect("Token should decode with the shared secret");

    let claims = decoded.claims;
    assert_eq!(decoded.header.alg, Algorithm::HS256);
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.role, "admin");
    assert_eq!(claims.kind, "access");
    assert_eq!(claims.exp - claims.iat, 15 * 60);
    assert_eq!(claims.exp, issued.expires_at.timestamp());
    assert!(uuid::Uuid::parse_str(&claims.jti).is_ok());
}

#[test]
fn test_forged_token_with_right_secret_is_accepted() {
    let config = Config::test_default();
    let now = Utc::now().timestamp();
    let claims = WireClaims {
        sub: "7".to_string(),
        role: "student".to_string(),
        kind: "access".to_string(),
        iat: now,
        exp: now + 60,
        jti: "manual".to_string(),
    };

    let token = forge(&claims, Algorithm::HS256, &config.jwt_secret);
    let verified = issuer().verify_access_token(&token).unwrap();

    assert_eq!(verified.user_id().unwrap(), 7);
    assert_eq!(verified.role, Role::Student);
}

#[test]
fn test_foreign_tokens_are_rejected() {
    let config = Config::test_default();
    let now = Utc::now().timestamp();
    let claims = WireClaims {
        sub: "7".to_string(),
        role: "student".to_string(),
        kind: "access".to_string(),
        iat: now,
        exp: now + 60,
        jti: "manual".to_string(),
    };

    let other_secret = forge(&claims, Algorithm::HS256, b"another_secret_that_is_32_bytes!");
    assert!(issuer().verify_access_token(&other_secret).is_err());

    let other_alg = forge(&claims, Algorithm::HS512, &config.jwt_secret);
    assert!(issuer().verify_access_token(&other_alg).is_err());

    let unknown_role = WireClaims {
        role: "superuser".to_string(),
        ..claims
    };
    let token = forge(&unknown_role, Algorithm::HS256, &config.jwt_secret);
    assert!(issuer().verify_access_token(&token).is_err());
}

#[tokio::test]
async fn test_token_without_kind_rejected_by_middleware() {
    #[derive(Serialize)]
    struct LegacyClaims {
        sub: String,
        exp: i64,
        iat: i64,
    }

    let (app, _ctx) = common::create_test_app();
    let config = Config::test_default();
    let now = Utc::now().timestamp();
    let token = forge(
        &LegacyClaims {
            sub: "1".to_string(),
            exp: now + 3600,
            iat: now,
        },
        Algorithm::HS256,
        &config.jwt_secret,
    );

    let request = Request::builder()
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_for_missing_user_is_unauthorized() {
    let (app, _ctx) = common::create_test_app();
    let token = issuer().issue_access_token(9999, Role::Student).unwrap();

    let request = Request::builder()
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token.token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
