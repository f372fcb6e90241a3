//! Configuration loading
//!
//! Values come from `config.toml` in the platform config directory, then
//! from environment variables (a `.env` file in the working directory is
//! loaded first if present).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::manager::DEFAULT_REFRESH_TIMEOUT;
use crate::auth::{AuthConfig, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, YOUTUBE_READONLY_SCOPE};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const TOKEN_FILE_NAME: &str = "token_info.json";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    /// Defaults to `http://{host}:{port}/callback`
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    /// API key used for public data when no credential is available
    pub api_key: Option<String>,
    pub api_base: String,
    /// Credential file; defaults to the platform data directory
    pub token_file: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub refresh_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            redirect_uri: None,
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            token_file: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "tubekey", "tubekey").context("Could not determine config directory")
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Load configuration from disk and environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        let mut config = Self::load_file(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from environment-style lookups. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = get("CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = get("AUTH_URI") {
            self.auth_uri = v;
        }
        if let Some(v) = get("TOKEN_URI") {
            self.token_uri = v;
        }
        if let Some(v) = get("REDIRECT_URI") {
            self.redirect_uri = Some(v);
        }
        if let Some(v) = get("YOUTUBE_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = get("TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TUBEKEY_HOST") {
            self.host = v;
        }
        match get("TUBEKEY_PORT").map(|v| v.parse::<u16>()) {
            Some(Ok(port)) => self.port = port,
            Some(Err(e)) => tracing::warn!("Ignoring invalid TUBEKEY_PORT: {}", e),
            None => {}
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(TOKEN_FILE_NAME)),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs.max(1))
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_uri: self.auth_uri.clone(),
            token_uri: self.token_uri.clone(),
            redirect_uri: self
                .redirect_uri
                .clone()
                .unwrap_or_else(|| format!("http://{}:{}/callback", self.host, self.port)),
            scopes: self.scopes.clone(),
        }
    }
}
