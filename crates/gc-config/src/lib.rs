//! GroupCheck Configuration
//!
//! Configuration is read once at start-up:
//! 1. Defaults
//! 2. Optional TOML file
//! 3. `GC_*` environment variable overrides
//!
//! The resulting [`AppConfig`] is validated and immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GC_HOST` | `0.0.0.0` | Bind address |
//! | `GC_PORT` / `PORT` | `5000` | HTTP port |
//! | `GC_ALLOWED_ORIGINS` | any | Comma separated CORS origins |
//! | `GC_TENANT_ID` | - | Directory tenant (required) |
//! | `GC_CLIENT_ID` | - | Application client id (required) |
//! | `GC_CLIENT_SECRET` | - | Application client secret (required) |
//! | `GC_GROUP_ID` | - | Target group id (required) |
//! | `GC_AUTHORITY_URL` | `https://login.microsoftonline.com` | Token authority |
//! | `GC_GRAPH_BASE_URL` | `https://graph.microsoft.com/v1.0` | Directory API base |
//! | `GC_SCOPE` | `https://graph.microsoft.com/.default` | Token scope |
//! | `GC_REQUEST_TIMEOUT_SECS` | `10` | Per-request timeout |
//! | `GC_CONNECT_TIMEOUT_SECS` | `5` | Connect timeout |
//! | `GC_MAX_PAGES` | `50` | Page limit for member listings |
//! | `GC_TOKEN_CACHE` | `true` | Reuse tokens until close to expiry |
//! | `GC_IDENTIFIER_KIND` | `email` | `email` or `user_id` |
//! | `GC_DIAGNOSTICS` | `false` | Include upstream error detail in responses |

use gc_common::{Credentials, DirectoryId, GroupReference, IdentifierKind, DEFAULT_SCOPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Directory service connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub group_id: String,
    pub authority_url: String,
    pub graph_base_url: String,
    pub scope: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_pages: u32,
    pub token_cache: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            group_id: String::new(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            max_pages: 50,
            token_cache: true,
        }
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("tenant_id", &"<redacted>")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("group_id", &"<redacted>")
            .field("authority_url", &self.authority_url)
            .field("graph_base_url", &self.graph_base_url)
            .field("scope", &self.scope)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("token_cache", &self.token_cache)
            .finish()
    }
}

impl DirectoryConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.tenant_id, &self.client_id, &self.client_secret)
            .with_scope(&self.scope)
    }

    pub fn group(&self) -> Result<GroupReference> {
        DirectoryId::parse(self.group_id.trim())
            .map(GroupReference::new)
            .map_err(|e| ConfigError::InvalidValue {
                key: "directory.group_id",
                message: e.to_string(),
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Complete process configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub directory: DirectoryConfig,
    pub identifier_kind: IdentifierKind,
    /// Expose upstream failure detail in error responses (never in production)
    pub diagnostics: bool,
}

impl AppConfig {
    /// Load from an optional TOML file and the process environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &|key| std::env::var(key).ok())
    }

    /// [`AppConfig::load`] with an explicit variable lookup.
    ///
    /// Tenant, client and group ids are never logged.
    pub fn load_with(path: Option<&Path>, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;

        info!(
            identifier_kind = %config.identifier_kind,
            token_cache = config.directory.token_cache,
            diagnostics = config.diagnostics,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Reading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `GC_*` overrides using the given variable lookup
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GC_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("GC_PORT").or_else(|| get("PORT")) {
            self.server.port = parse_value("server.port", &v)?;
        }
        if let Some(v) = get("GC_ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let dir = &mut self.directory;
        if let Some(v) = get("GC_TENANT_ID") {
            dir.tenant_id = v;
        }
        if let Some(v) = get("GC_CLIENT_ID") {
            dir.client_id = v;
        }
        if let Some(v) = get("GC_CLIENT_SECRET") {
            dir.client_secret = v;
        }
        if let Some(v) = get("GC_GROUP_ID") {
            dir.group_id = v;
        }
        if let Some(v) = get("GC_AUTHORITY_URL") {
            dir.authority_url = v;
        }
        if let Some(v) = get("GC_GRAPH_BASE_URL") {
            dir.graph_base_url = v;
        }
        if let Some(v) = get("GC_SCOPE") {
            dir.scope = v;
        }
        if let Some(v) = get("GC_REQUEST_TIMEOUT_SECS") {
            dir.request_timeout_secs = parse_value("directory.request_timeout_secs", &v)?;
        }
        if let Some(v) = get("GC_CONNECT_TIMEOUT_SECS") {
            dir.connect_timeout_secs = parse_value("directory.connect_timeout_secs", &v)?;
        }
        if let Some(v) = get("GC_MAX_PAGES") {
            dir.max_pages = parse_value("directory.max_pages", &v)?;
        }
        if let Some(v) = get("GC_TOKEN_CACHE") {
            dir.token_cache = parse_bool("directory.token_cache", &v)?;
        }

        if let Some(v) = get("GC_IDENTIFIER_KIND") {
            self.identifier_kind = v.parse().map_err(|message| ConfigError::InvalidValue {
                key: "identifier_kind",
                message,
            })?;
        }
        if let Some(v) = get("GC_DIAGNOSTICS") {
            self.diagnostics = parse_bool("diagnostics", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let dir = &self.directory;
        if dir.tenant_id.trim().is_empty() {
            return Err(ConfigError::Missing("directory.tenant_id"));
        }
        if dir.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("directory.client_id"));
        }
        if dir.client_secret.is_empty() {
            return Err(ConfigError::Missing("directory.client_secret"));
        }
        if dir.group_id.trim().is_empty() {
            return Err(ConfigError::Missing("directory.group_id"));
        }
        dir.group()?;

        for (key, secs) in [
            ("directory.request_timeout_secs", dir.request_timeout_secs),
            ("directory.connect_timeout_secs", dir.connect_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if dir.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "directory.max_pages",
                message: "must be greater than zero".to_string(),
            });
        }
        for (key, url) in [
            ("directory.authority_url", &dir.authority_url),
            ("directory.graph_base_url", &dir.graph_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: format!("not an http(s) URL: {}", url),
                });
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        message: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a boolean, got {}", other),
        }),
    }
}
