//! `config.toml` loading. Every field has a default, so an empty file works.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, VaultError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/groupvault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
///
/// Per-file and per-user limits live in the settings table so that
/// administrators can change them at runtime. The request body cap here is
/// a hard transport limit above which the server refuses to read at all.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Path to the blob storage directory.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Maximum request body size for uploads in megabytes.
    #[serde(default = "default_max_request_body")]
    pub max_request_body_mb: u64,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_request_body() -> u64 {
    64
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_request_body_mb: default_max_request_body(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/groupvault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key (required).
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Refresh token expiry in days.
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_token_expiry_days: u64,
    /// Rate limit for the login endpoint (requests per minute per IP).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP` when rate
    /// limiting. Enable only behind a reverse proxy that sets them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8000
}

fn default_jwt_access_expiry() -> u64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiry() -> u64 {
    7
}

fn default_login_rate_limit() -> u32 {
    5
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            jwt_refresh_token_expiry_days: default_jwt_refresh_expiry(),
            login_rate_limit: default_login_rate_limit(),
            trust_proxy_headers: false,
        }
    }
}

/// Bootstrap administrator account.
///
/// When both fields are set, an admin with this username is created on
/// startup unless one already exists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Username of the bootstrap admin.
    #[serde(default)]
    pub username: Option<String>,
    /// Plain-text password of the bootstrap admin.
    #[serde(default)]
    pub password: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Bootstrap admin configuration.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Read a non-empty environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl FilesConfig {
    /// Upload body cap in bytes, saturating on 32-bit targets.
    pub fn max_request_body_bytes(&self) -> usize {
        let bytes = self.max_request_body_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

impl WebConfig {
    /// `host:port` string the API listens on.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Load a TOML file, then let the environment override secrets.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// `GROUPVAULT_JWT_SECRET` replaces `web.jwt_secret` and
    /// `GROUPVAULT_ADMIN_PASSWORD` replaces `admin.password`. Empty values
    /// are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = env_value("GROUPVAULT_JWT_SECRET") {
            self.web.jwt_secret = secret;
        }
        if let Some(password) = env_value("GROUPVAULT_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }

    /// Reject settings the server can't start with.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.web.jwt_secret.is_empty() {
            Some("jwt_secret is not set; use [web] jwt_secret or GROUPVAULT_JWT_SECRET")
        } else if self.admin.username.is_some() != self.admin.password.is_some() {
            Some("[admin] requires both username and password")
        } else if self.files.max_request_body_mb == 0 {
            Some("[files] max_request_body_mb must be at least 1")
        } else if self.web.login_rate_limit == 0 {
            Some("[web] login_rate_limit must be at least 1")
        } else if self.web.jwt_access_token_expiry_secs == 0
            || self.web.jwt_refresh_token_expiry_days == 0
        {
            Some("[web] token expiry values must be positive")
        } else {
            None
        };

        match problem {
            Some(msg) => Err(VaultError::Config(msg.to_string())),
            None => Ok(()),
        }
    }
}
