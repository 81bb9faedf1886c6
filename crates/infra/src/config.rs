//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

pub use casahub_observability::LogFormat;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 720;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@casahub.local";

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub reason: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// Postgres connection string; `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub admin_email: String,
    pub admin_password: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = get("CASAHUB_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError {
                key: "CASAHUB_BIND",
                reason: e.to_string(),
            })?;

        let token_ttl = match get("TOKEN_TTL_MINUTES") {
            None => Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            Some(raw) => {
                let minutes: i64 = raw.trim().parse().map_err(|_| ConfigError {
                    key: "TOKEN_TTL_MINUTES",
                    reason: format!("expected a whole number of minutes, got '{raw}'"),
                })?;
                if minutes <= 0 {
                    return Err(ConfigError {
                        key: "TOKEN_TTL_MINUTES",
                        reason: "must be positive".to_string(),
                    });
                }
                Duration::minutes(minutes)
            }
        };

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse().map_err(|reason| ConfigError {
                key: "LOG_FORMAT",
                reason,
            })?,
        };

        Ok(Self {
            bind,
            database_url: get("DATABASE_URL"),
            jwt_secret: get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            token_ttl,
            admin_email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            admin_password: get("ADMIN_PASSWORD").unwrap_or_else(|| DEV_ADMIN_PASSWORD.to_string()),
            log_format,
        })
    }

    /// Names of settings still on their insecure development defaults.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.jwt_secret == DEV_JWT_SECRET {
            keys.push("JWT_SECRET");
        }
        if self.admin_password == DEV_ADMIN_PASSWORD {
            keys.push("ADMIN_PASSWORD");
        }
        keys
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind", &self.bind)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"<redacted>")
            .field("log_format", &self.log_format)
            .finish()
    }
}
