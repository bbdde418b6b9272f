//! Configuration for the requisitions server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file is honoured when the binary calls `dotenvy::dotenv()`
//! before [`Config::from_env`].

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Document store configuration
    pub database: DatabaseConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset
    pub log_level: String,
    /// Port of the Prometheus scrape endpoint
    pub metrics_port: u16,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; requisitions are kept in memory when unset
    pub url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of an
    /// environment variable if it is set.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT").unwrap_or(3000),
                log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT").unwrap_or(9000),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            },
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address of the Prometheus scrape endpoint (all interfaces).
    #[must_use]
    pub fn metrics_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.server.metrics_port))
    }
}
