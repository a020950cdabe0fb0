use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bearer key issued to a single user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub user_id: String,
}

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON documents under `data_dir`
    #[default]
    File,
    /// Process memory; contents are lost on restart
    Memory,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" => Some(StoreBackend::File),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Root directory of the file-backed document store
    pub data_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("habit-sync"),
            store_backend: StoreBackend::File,
            api_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        let mut config = Self::load_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Reads the config file alone, without environment overrides.
    /// A missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    /// Applies `HABIT_SYNC_*` overrides from the given variable lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("HABIT_SYNC_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("HABIT_SYNC_PORT", port))?;
        }
        if let Some(data_dir) = lookup("HABIT_SYNC_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(backend) = lookup("HABIT_SYNC_STORE") {
            self.store_backend = StoreBackend::parse(&backend)
                .ok_or(ConfigError::InvalidEnv("HABIT_SYNC_STORE", backend))?;
        }
        Ok(())
    }

    /// Writes the configuration back as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))?;
        }
        let contents = serde_yaml::to_string(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))
    }

    /// Default config file path: `$HABIT_SYNC_CONFIG`, else ~/.config/habit-sync/config.yaml
    pub fn default_config_path() -> PathBuf {
        std::env::var("HABIT_SYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("habit-sync")
                    .join("config.yaml")
            })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    WriteError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    SerializeError(serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::WriteError(path, e) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::SerializeError(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
