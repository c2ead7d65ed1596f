use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::sessions::{DEFAULT_HARD_WINDOW, DEFAULT_IDLE_WINDOW};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthConfig {
    /// Path prefix for the login/logout/status endpoints.
    pub prefix: String,
    /// Path prefix for routes that require a logged-in user.
    pub api_prefix: String,
    pub password_file: PathBuf,
    pub max_clock_skew_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub hard_expiry_seconds: u64,
    /// Create an empty password file at startup if none exists.
    pub autocreate_password_file: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            prefix: "/auth/".to_string(),
            api_prefix: "/api/".to_string(),
            password_file: PathBuf::from("passwd.txt"),
            max_clock_skew_seconds: 2,
            idle_timeout_seconds: DEFAULT_IDLE_WINDOW,
            hard_expiry_seconds: DEFAULT_HARD_WINDOW,
            autocreate_password_file: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config_contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&config_contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
