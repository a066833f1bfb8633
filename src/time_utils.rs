// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_utc_rfc3339_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2026-03-01T08:30:00Z");
    }
}
