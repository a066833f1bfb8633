// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod token;
pub mod user;

pub use token::{NewRefreshToken, StoredRefreshToken};
pub use user::{NewUser, Role, User};
