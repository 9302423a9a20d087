use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a login stays valid.
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
}

/// Two weeks, the usual lifetime of a storefront login.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 14;

/// Reads the configuration from the process environment.
///
/// Call [`crate::core::bootstrap::init_env`] first so a `.env` file is honored.
pub fn load() -> Result<Config> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    Ok(Config {
        database: DatabaseConfig {
            url,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
        },
        server: ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("SERVER_PORT", 3000)?,
        },
        session: SessionConfig {
            ttl_hours: parse_or("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
        },
    })
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}
