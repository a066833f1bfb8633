//! Application configuration loaded from environment variables.
//!
//! The token signing secret is mandatory. Startup fails when it is unset
//! or too short rather than signing with a built-in default.

use chrono::Duration;
use std::env;
use std::fmt;

/// Minimum length of `JWT_SECRET` in bytes (HS256 key size).
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Postgres URL. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    /// HS256 signing key for access and refresh tokens (raw bytes)
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Lifetime of one-time codes
    pub otp_ttl: Duration,

    /// Argon2 memory cost in KiB
    pub password_hash_memory_kib: u32,
    /// Argon2 time cost
    pub password_hash_iterations: u32,

    /// Upper bound on the time spent handling one request
    pub request_timeout: std::time::Duration,
    /// Period of the sweep that drops expired codes and refresh tokens
    pub purge_interval: std::time::Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("frontend_url", &self.frontend_url)
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &"[redacted]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("otp_ttl", &self.otp_ttl)
            .field("password_hash_memory_kib", &self.password_hash_memory_kib)
            .field("password_hash_iterations", &self.password_hash_iterations)
            .field("request_timeout", &self.request_timeout)
            .field("purge_interval", &self.purge_interval)
            .finish()
    }
}

impl Config {
    /// Deterministic configuration for tests: fixed secret, cheap hashing.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            database_url: None,
            database_max_connections: 5,
            jwt_secret: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            otp_ttl: Duration::minutes(5),
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
            request_timeout: std::time::Duration::from_secs(30),
            purge_interval: std::time::Duration::from_secs(300),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = env::var("JWT_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret(MIN_JWT_SECRET_LEN));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_positive("DATABASE_MAX_CONNECTIONS", 10)?,

            jwt_secret: jwt_secret.into_bytes(),
            access_token_ttl: Duration::minutes(parse_positive(
                "ACCESS_TOKEN_DURATION_MINUTES",
                15,
            )?),
            refresh_token_ttl: Duration::days(parse_positive("REFRESH_TOKEN_DURATION_DAYS", 7)?),
            otp_ttl: Duration::seconds(parse_positive("OTP_TTL_SECONDS", 300)?),

            password_hash_memory_kib: parse_positive("PASSWORD_HASH_MEMORY_KIB", 19_456)?,
            password_hash_iterations: parse_positive("PASSWORD_HASH_ITERATIONS", 2)?,

            request_timeout: std::time::Duration::from_secs(parse_positive(
                "REQUEST_TIMEOUT_SECS",
                30,
            )?),
            purge_interval: std::time::Duration::from_secs(parse_positive(
                "PURGE_INTERVAL_SECS",
                300,
            )?),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_var(name, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid(name));
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("JWT_SECRET must be at least {0} bytes")]
    WeakSecret(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = Config::test_default();
        config.database_url = Some("postgres://app:hunter2@db/fitstudio".to_string());
        let printed = format!("{:?}", config);

        assert!(printed.contains("[redacted]"));
        assert!(!printed.contains("test_jwt_key"));
        assert!(!printed.contains("hunter2"));
        // Byte-list rendering of the secret must not appear either.
        assert!(!printed.contains(&format!("{:?}", config.jwt_secret)));
    }

    // Environment mutation is process-global, so every env-dependent
    // assertion lives in this one test.
    #[test]
    fn test_config_from_env() {
        env::remove_var("JWT_SECRET");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));

        env::set_var("JWT_SECRET", "too-short");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::WeakSecret(MIN_JWT_SECRET_LEN))
        ));

        env::set_var("JWT_SECRET", "test_jwt_key_32_bytes_minimum!!!");
        env::set_var("ACCESS_TOKEN_DURATION_MINUTES", "30");
        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.access_token_ttl, Duration::minutes(30));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.otp_ttl, Duration::minutes(5));

        env::set_var("ACCESS_TOKEN_DURATION_MINUTES", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("ACCESS_TOKEN_DURATION_MINUTES"))
        ));

        env::remove_var("ACCESS_TOKEN_DURATION_MINUTES");
        env::remove_var("JWT_SECRET");
    }
}
