//! Process configuration read from the environment at startup.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3001;

/// Database file, relative to the working directory.
pub const DATABASE_FILE: &str = "todos.db";

/// Origins that are always allowed, before `FRONTEND_URL` is added.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "https://claude.ai",
    "https://www.claude.ai",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be a number between 0 and 65535, got `{0}`")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Deployment name, only used in the startup log (`APP_ENV`).
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub database_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let mut allowed_origins: Vec<String> =
            DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect();
        if let Some(frontend) = get("FRONTEND_URL") {
            let frontend = frontend.trim().to_string();
            if !allowed_origins.contains(&frontend) {
                allowed_origins.push(frontend);
            }
        }

        Ok(Self {
            port,
            environment: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            allowed_origins,
            database_path: PathBuf::from(DATABASE_FILE),
        })
    }

    /// Socket address the server binds: all interfaces on `port`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
