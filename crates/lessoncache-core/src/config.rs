//! Application configuration management.
//!
//! This module resolves the backend endpoints from the environment and
//! handles the persisted user configuration (an optional API URL override
//! and the last signed-in user).
//!
//! Configuration is stored at `~/.config/lessoncache/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Application name used for config/data directory paths
const APP_NAME: &str = "lessoncache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_VAR: &str = "LESSONCACHE_ENV";
const API_URL_VAR: &str = "LESSONCACHE_API_URL";
const WS_API_URL_VAR: &str = "LESSONCACHE_WS_API_URL";

const DEV_API_URL: &str = "http://localhost:8000";
const DEV_WS_API_URL: &str = "ws://localhost:8000";
const PROD_API_HOST: &str = "platform.poc.vng.ai";
const PROD_API_PREFIX: &str = "/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    MissingDirectory(&'static str),

    #[error("Invalid API URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// `LESSONCACHE_ENV=production` selects production; anything else is
    /// development.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Where the backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub environment: Environment,
    pub api_url: String,
    pub api_host: String,
    pub api_prefix_path: String,
    pub ws_api_url: String,
}

impl ApiEndpoints {
    /// Resolve endpoints for `environment`. Overrides only apply in
    /// production; development always targets the local backend.
    pub fn resolve(environment: Environment, api_url: Option<&str>, ws_api_url: Option<&str>) -> Self {
        if environment == Environment::Development {
            return Self {
                environment,
                api_url: DEV_API_URL.to_string(),
                api_host: String::new(),
                api_prefix_path: String::new(),
                ws_api_url: DEV_WS_API_URL.to_string(),
            };
        }

        let (api_url, api_host, api_prefix_path) = match api_url.filter(|u| !u.is_empty()) {
            Some(url) => match split_url(url) {
                Ok((host, path)) => (url.to_string(), host, path),
                Err(e) => {
                    warn!(error = %e, "Failed to parse API URL");
                    (url.to_string(), String::new(), String::new())
                }
            },
            None => (
                format!("https://{}{}", PROD_API_HOST, PROD_API_PREFIX),
                PROD_API_HOST.to_string(),
                PROD_API_PREFIX.to_string(),
            ),
        };

        let ws_api_url = match ws_api_url.filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => websocket_url(&api_url),
        };

        Self {
            environment,
            api_url,
            api_host,
            api_prefix_path,
            ws_api_url,
        }
    }

    pub fn from_env() -> Self {
        let api_url = std::env::var(API_URL_VAR).ok();
        let ws_api_url = std::env::var(WS_API_URL_VAR).ok();
        Self::resolve(Environment::from_env(), api_url.as_deref(), ws_api_url.as_deref())
    }

    /// Endpoints for an explicit API URL (e.g. from the user config).
    pub fn custom(api_url: &str) -> Result<Self, ConfigError> {
        let (api_host, api_prefix_path) = split_url(api_url)?;
        Ok(Self {
            environment: Environment::Production,
            api_url: api_url.to_string(),
            api_host,
            api_prefix_path,
            ws_api_url: websocket_url(api_url),
        })
    }
}

/// Host (with port) and path prefix of `url`. An empty path means `/api`.
fn split_url(url: &str) -> Result<(String, String), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            })
        }
    };
    let path = match parsed.path() {
        "" | "/" => PROD_API_PREFIX.to_string(),
        path => path.to_string(),
    };
    Ok((host, path))
}

/// `https://host/api` becomes `wss://host/api`.
fn websocket_url(api_url: &str) -> String {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = api_url.strip_prefix(scheme) {
            return format!("wss://{}", rest);
        }
    }
    api_url.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Overrides the environment-selected API URL.
    pub api_url: Option<String>,
    pub last_user_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Endpoints to use: the configured override, else the environment.
    pub fn endpoints(&self) -> Result<ApiEndpoints, ConfigError> {
        match self.api_url.as_deref() {
            Some(url) => ApiEndpoints::custom(url),
            None => Ok(ApiEndpoints::from_env()),
        }
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::MissingDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session file.
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_local_dir().ok_or(ConfigError::MissingDirectory("data"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
