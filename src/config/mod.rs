//! Configuration module for the movie shelf backend.
//!
//! All configuration is loaded from environment variables (optionally via a
//! `.env` file) with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::metadata::OMDB_DEFAULT_BASE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name} value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which persistence backend holds the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(StoreBackend::Json),
            "sqlite" | "sql" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Persistence backend (json or sqlite)
    pub store_backend: StoreBackend,
    /// Path to the JSON document
    pub data_path: PathBuf,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// OMDb API key
    pub omdb_api_key: Option<String>,
    /// OMDb endpoint, overridable for tests and proxies
    pub omdb_base_url: String,
    /// Upper bound on a single metadata lookup
    pub omdb_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_raw = var("MOVIES_STORE_BACKEND").unwrap_or_else(|| "json".to_string());
        let store_backend =
            StoreBackend::parse(&backend_raw).ok_or_else(|| ConfigError::Invalid {
                name: "MOVIES_STORE_BACKEND",
                value: backend_raw.clone(),
                reason: "expected json or sqlite".to_string(),
            })?;

        let data_path = var("MOVIES_DATA_PATH")
            .unwrap_or_else(|| "./data/movies.json".to_string())
            .into();

        let db_path = var("MOVIES_DB_PATH")
            .unwrap_or_else(|| "./data/movies.sqlite".to_string())
            .into();

        let bind_raw = var("MOVIES_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: "MOVIES_BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let log_level = var("MOVIES_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        // `movie_api_key` is the name older deployments used in their .env
        let omdb_api_key = var("OMDB_API_KEY")
            .or_else(|| var("movie_api_key"))
            .filter(|key| !key.trim().is_empty());

        let omdb_base_url =
            var("OMDB_BASE_URL").unwrap_or_else(|| OMDB_DEFAULT_BASE_URL.to_string());

        let timeout_raw = var("OMDB_TIMEOUT_SECS").unwrap_or_else(|| "10".to_string());
        let timeout_secs: u64 = timeout_raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name: "OMDB_TIMEOUT_SECS",
                value: timeout_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            store_backend,
            data_path,
            db_path,
            bind_addr,
            log_level,
            omdb_api_key,
            omdb_base_url,
            omdb_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
