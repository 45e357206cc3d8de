//! Runtime configuration
//!
//! Parsed once at startup from CLI flags with environment fallbacks
//! (`.env` is loaded first by the binary).

use crate::auth::jwt::DEFAULT_VALIDITY_HOURS;
use crate::auth::service::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::middleware::RateLimitConfig;
use crate::storage::StorageBackend;
use anyhow::{bail, Result};
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Longest token validity accepted (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Parser, Debug)]
#[command(name = "studynote")]
#[command(about = "StudyNote API - personal notes behind bearer-token auth")]
pub struct Cli {
    /// Token signing secret
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: String,

    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Storage backend
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value = "sqlite")]
    pub storage: StorageBackend,

    /// SQLite database file (sqlite backend only)
    #[arg(long, env = "DATABASE_PATH", default_value = "studynote.db")]
    pub database_path: String,

    /// Token validity in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = DEFAULT_VALIDITY_HOURS)]
    pub token_ttl_hours: i64,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Seconds in-flight requests get to finish after a shutdown signal
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "5")]
    pub shutdown_grace_secs: u64,

    /// Login/register attempts per client per window (0 disables)
    #[arg(long, env = "AUTH_RATE_LIMIT", default_value = "20")]
    pub auth_rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, env = "AUTH_RATE_WINDOW_SECS", default_value = "60")]
    pub auth_rate_window_secs: u64,
}

/// Validated configuration handed to the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret: SecretString,
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_path: String,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub shutdown_grace: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let secret = SecretString::from(cli.secret);
        if secret.expose_secret().trim().is_empty() {
            bail!("SECRET must not be empty");
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&cli.token_ttl_hours) {
            bail!(
                "TOKEN_TTL_HOURS must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS,
                cli.token_ttl_hours
            );
        }
        let Some(token_ttl) = chrono::Duration::try_hours(cli.token_ttl_hours) else {
            bail!("TOKEN_TTL_HOURS out of range: {}", cli.token_ttl_hours);
        };
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cli.bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {} and {}, got {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST,
                cli.bcrypt_cost
            );
        }

        Ok(Self {
            secret,
            host: cli.host,
            port: cli.port,
            storage: cli.storage,
            database_path: cli.database_path,
            token_ttl,
            bcrypt_cost: cli.bcrypt_cost,
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            rate_limit: RateLimitConfig {
                max_requests: cli.auth_rate_limit,
                window: Duration::from_secs(cli.auth_rate_window_secs.max(1)),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
