//! Process configuration read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | `dev-secret` (warns) |
//! | `DATABASE_URL` | unset: in-memory store |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `PURCHASE_TX_TIMEOUT_MS` | `5000` |

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid {expected}: {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Connection settings for the Postgres backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    /// Upper bound on how long one purchase unit of work may stay open.
    pub purchase_tx_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => parse(&raw, "BIND_ADDR", "socket address")?,
            None => default_bind_addr(),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let database = match get("DATABASE_URL") {
            Some(url) => {
                let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
                    Some(raw) => positive(
                        parse(&raw, "DATABASE_MAX_CONNECTIONS", "positive integer")?,
                        &raw,
                        "DATABASE_MAX_CONNECTIONS",
                    )?,
                    None => default_db_max_connections(),
                };
                Some(DatabaseConfig { url, max_connections })
            }
            None => None,
        };

        let purchase_tx_timeout = match get("PURCHASE_TX_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(positive(
                parse(&raw, "PURCHASE_TX_TIMEOUT_MS", "positive integer")?,
                &raw,
                "PURCHASE_TX_TIMEOUT_MS",
            )?),
            None => default_purchase_tx_timeout(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database,
            purchase_tx_timeout,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database: None,
            purchase_tx_timeout: default_purchase_tx_timeout(),
        }
    }
}

fn parse<T: std::str::FromStr>(
    raw: &str,
    name: &'static str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value: raw.to_string(),
    })
}

fn positive<T: Default + PartialOrd>(value: T, raw: &str, name: &'static str) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            expected: "positive integer",
            value: raw.to_string(),
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_purchase_tx_timeout() -> Duration {
    Duration::from_millis(5_000)
}
