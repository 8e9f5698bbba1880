use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::auth::TokenConfig;

pub mod cors;
pub mod security;

pub use cors::{create_cors_layer, DEFAULT_ALLOWED_ORIGINS};
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/eventdesk";
const DEV_JWT_SECRET: &str = "eventdesk-development-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set in production")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// Settings for the HTTP middleware stack.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub cors_allowed_origins: String,
    pub include_hsts: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            include_hsts: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub storage: StorageBackend,
    pub server_addr: SocketAddr,
    pub tokens: TokenConfig,
    pub admin_seed: Option<AdminSeed>,
    pub http: HttpSettings,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let production = var("RUST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let signing_key = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development signing key");
                DEV_JWT_SECRET.to_string()
            }
        };

        let access_minutes: i64 = parse_or(&var, "ACCESS_TOKEN_TTL_MINUTES", 4320)?;
        let refresh_days: i64 = parse_or(&var, "REFRESH_TOKEN_TTL_DAYS", 14)?;
        let tokens = TokenConfig {
            signing_key,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "eventdesk".to_string()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "eventdesk-clients".to_string()),
            access_token_ttl: Duration::minutes(access_minutes),
            refresh_token_ttl: Duration::days(refresh_days),
        };

        let admin_seed = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 5)?,
            storage: parse_or(&var, "STORAGE_BACKEND", StorageBackend::Postgres)?,
            server_addr: parse_or(&var, "SERVER_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            tokens,
            admin_seed,
            http: HttpSettings {
                cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
                include_hsts: production,
            },
            production,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.server_addr.port(), 3001);
        assert_eq!(config.tokens.access_token_ttl, Duration::minutes(4320));
        assert_eq!(config.tokens.refresh_token_ttl, Duration::days(14));
        assert_eq!(config.tokens.issuer, "eventdesk");
        assert!(config.admin_seed.is_none());
        assert_eq!(config.http.cors_allowed_origins, DEFAULT_ALLOWED_ORIGINS);
        assert!(!config.http.include_hsts);
        assert!(!config.production);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
            ("ACCESS_TOKEN_TTL_MINUTES", "15"),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "root-pass-123"),
        ])
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.tokens.access_token_ttl, Duration::minutes(15));
        assert_eq!(
            config.admin_seed.map(|seed| seed.email).as_deref(),
            Some("root@example.com")
        );
    }

    #[test]
    fn test_malformed_values_are_reported() {
        let err = config_from(&[("DATABASE_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "DATABASE_MAX_CONNECTIONS",
                ..
            }
        ));
        assert!(config_from(&[("STORAGE_BACKEND", "redis")]).is_err());
    }

    #[test]
    fn test_production_requires_secret() {
        let err = config_from(&[("RUST_ENV", "production")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
        let config = config_from(&[("RUST_ENV", "production"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(config.production);
        assert!(config.http.include_hsts);
        assert_eq!(config.tokens.signing_key, "s3cret");
    }
}
