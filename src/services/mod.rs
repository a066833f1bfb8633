// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod delivery;
pub mod otp;
pub mod password;
pub mod session;
pub mod token;

pub use delivery::{LogOtpSender, OtpSender};
pub use otp::{OtpError, OtpPurpose, OtpRegistry};
pub use password::{PasswordError, PasswordHasher};
pub use session::{AuthError, AuthResult, OtpLogin, RegisterInput, SessionService};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer, TokenKind};
