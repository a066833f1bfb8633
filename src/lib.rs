// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitstudio: session and credential backend for a fitness studio
//!
//! This crate provides registration, password and OTP login, token
//! refresh, logout and password management over an HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{RefreshTokenStore, UserStore};
use services::{OtpRegistry, OtpSender, PasswordError, PasswordHasher, SessionService, TokenIssuer};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: SessionService,
}

impl AppState {
    /// Wire the session service from configuration and the given stores.
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        sender: Arc<dyn OtpSender>,
    ) -> Result<Self, PasswordError> {
        let hasher = PasswordHasher::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )?;
        let session = SessionService::new(
            users,
            refresh_tokens,
            Arc::new(OtpRegistry::new(config.otp_ttl)),
            sender,
            TokenIssuer::from_config(&config),
            hasher,
        );

        Ok(Self { config, session })
    }
}
