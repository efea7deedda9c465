//! Gateway configuration.
//!
//! Configuration is read from a TOML file with every field defaulted, so an
//! empty or missing file yields a working local setup. The `PORT` environment
//! variable overrides the configured port.
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [database]
//! backend = "mongodb"
//! prefix = "mongodb+srv://"
//! user = "webstore"
//! password = "p@ss"
//! url = "@cluster0.x1uat2z.mongodb.net"
//! params = "/?retryWrites=true&w=majority"
//! name = "webstore"
//! ```

use std::{fmt, io, path::{Path, PathBuf}, str::FromStr};

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::AllowOrigin;

/// Environment variable overriding [`ServerConfig::port`].
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {name} value `{value}`")]
    InvalidEnv { name: &'static str, value: String },
    #[error("unknown backend `{0}`, expected `mongodb` or `memory`")]
    UnknownBackend(String),
    #[error("invalid CORS origin `{0}`")]
    InvalidOrigin(String),
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

impl GatewayConfig {
    /// Loads the configuration from `path`, falling back to defaults when the
    /// file does not exist, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            config.apply_port_override(&port)?;
        }

        Ok(config)
    }

    /// Parses a configuration from TOML text without consulting the environment.
    ///
    /// CORS origins are checked here so a bad entry fails at load time.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.server.allow_origin()?;

        Ok(config)
    }

    fn apply_port_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.server.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: PORT_ENV,
            value: raw.to_string(),
        })?;

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins (default: empty, any origin allowed; `*` also allows any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves `cors_origins` into the origins the CORS layer accepts.
    ///
    /// An empty list or a `*` entry allows any origin.
    pub fn allow_origin(&self) -> Result<AllowOrigin, ConfigError> {
        if self.cors_origins.is_empty() || self.cors_origins.iter().any(|origin| origin == "*") {
            return Ok(AllowOrigin::any());
        }

        let origins = self
            .cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AllowOrigin::list(origins))
    }
}

/// Which storage backend serves the collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mongodb,
    Memory,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mongodb" => Ok(BackendKind::Mongodb),
            "memory" => Ok(BackendKind::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Mongodb => f.write_str("mongodb"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Datastore connection settings.
///
/// The connection string is assembled from its parts the way hosted MongoDB
/// clusters hand them out: `prefix`, URL-encoded credentials, `url` (which
/// starts with `@` when credentials are present) and `params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub params: String,

    /// Database holding the collections (default: "webstore")
    #[serde(default = "default_database_name")]
    pub name: String,
}

fn default_prefix() -> String {
    "mongodb://".to_string()
}

fn default_url() -> String {
    "localhost:27017".to_string()
}

fn default_database_name() -> String {
    "webstore".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            prefix: default_prefix(),
            user: None,
            password: None,
            url: default_url(),
            params: String::new(),
            name: default_database_name(),
        }
    }
}

impl DatabaseConfig {
    /// Builds the connection string, URL-encoding the credentials.
    pub fn connection_string(&self) -> String {
        match &self.user {
            Some(user) => format!(
                "{}{}:{}{}{}",
                self.prefix,
                urlencoding::encode(user),
                urlencoding::encode(self.password.as_deref().unwrap_or_default()),
                self.url,
                self.params,
            ),
            None => format!("{}{}{}", self.prefix, self.url, self.params),
        }
    }
}

/// Full-text search settings for the lessons collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_fields")]
    pub fields: Vec<String>,

    /// Create the text index at startup (default: true)
    #[serde(default = "default_true")]
    pub ensure_index: bool,
}

fn default_search_fields() -> Vec<String> {
    vec!["subject".to_string(), "location".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fields: default_search_fields(),
            ensure_index: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory served under `/lesson-images` (default: "lesson-images")
    #[serde(default = "default_lesson_images_dir")]
    pub lesson_images_dir: PathBuf,
}

fn default_lesson_images_dir() -> PathBuf {
    PathBuf::from("lesson-images")
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            lesson_images_dir: default_lesson_images_dir(),
        }
    }
}
