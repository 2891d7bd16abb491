use daylog_core::{EngineConfig, Templates};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Where log records are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Http,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Http => write!(f, "http"),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    pub backend: ConfigValue<Backend>,
    /// Base URL of the record service (e.g., "https://logs.example.com/api")
    pub server_url: ConfigValue<Option<String>>,
    /// API key for authentication
    #[serde(skip_serializing)]
    pub api_key: ConfigValue<Option<String>>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    pub store: StoreConfig,
    pub engine: EngineConfig,
    #[serde(skip)]
    pub templates: Templates,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreFile {
    backend: Option<Backend>,
    server_url: Option<String>,
    api_key: Option<String>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    store: Option<StoreFile>,
    engine: Option<EngineConfig>,
    templates: Option<Templates>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("daylog.db"),
            ConfigSource::Default,
        );
        let mut backend = ConfigValue::new(Backend::default(), ConfigSource::Default);
        let mut server_url = ConfigValue::new(None, ConfigSource::Default);
        let mut api_key = ConfigValue::new(None, ConfigSource::Default);
        let mut engine = EngineConfig::default();
        let mut templates = Templates::default();
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(store) = file_config.store {
                if let Some(b) = store.backend {
                    backend = ConfigValue::new(b, ConfigSource::File);
                }
                if let Some(url) = store.server_url {
                    server_url = ConfigValue::new(Some(url), ConfigSource::File);
                }
                if let Some(key) = store.api_key {
                    api_key = ConfigValue::new(Some(key), ConfigSource::File);
                }
            }
            if let Some(e) = file_config.engine {
                engine = e;
            }
            if let Some(t) = file_config.templates {
                templates = t;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("DAYLOG_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("DAYLOG_STORE_URL") {
            server_url = ConfigValue::new(Some(url), ConfigSource::Environment);
            // A server URL from the environment selects the remote store.
            if backend.source != ConfigSource::File {
                backend = ConfigValue::new(Backend::Http, ConfigSource::Environment);
            }
        }
        if let Ok(key) = std::env::var("DAYLOG_STORE_API_KEY") {
            api_key = ConfigValue::new(Some(key), ConfigSource::Environment);
        }

        if backend.value == Backend::Http && server_url.value.is_none() {
            return Err(ConfigError::MissingServerUrl);
        }

        Ok(Self {
            database_path,
            store: StoreConfig {
                backend,
                server_url,
                api_key,
            },
            engine,
            templates,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/daylog/
    /// - macOS: ~/Library/Application Support/daylog/
    /// - Windows: %APPDATA%/daylog/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("daylog")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/daylog/
    /// - macOS: ~/Library/Application Support/daylog/
    /// - Windows: %APPDATA%/daylog/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("daylog")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    MissingServerUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingServerUrl => {
                write!(
                    f,
                    "The http store backend needs store.server_url or DAYLOG_STORE_URL"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
