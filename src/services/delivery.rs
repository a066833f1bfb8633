// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Out-of-band delivery of one-time codes.

use crate::services::otp::OtpPurpose;
use async_trait::async_trait;

/// Delivers a code to a phone (SMS gateway, log, test recorder).
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()>;
}

/// Development sender: writes the code to the log instead of sending an SMS.
#[derive(Debug, Clone, Default)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, phone: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
        tracing::info!(
            phone = %mask_phone(phone),
            purpose = purpose.as_str(),
            code,
            "OTP issued (log delivery)"
        );
        Ok(())
    }
}

/// Keep only the last four digits of a phone number for logging.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}
