//! Configuration file loading and parsing.

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::env::{vars, EnvError, Environment};
use crate::types::RdcacheConfig;

/// Directory holding the config file, relative to the project.
pub const CONFIG_DIR: &str = ".rdcache";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

const ENV_PATTERN: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

/// Configuration loader.
pub struct ConfigLoader {
    path: PathBuf,
    required: bool,
}

impl ConfigLoader {
    /// Loader for `<project_dir>/.rdcache/config.yaml`.
    ///
    /// A missing file yields the defaults.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            path: project_dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE),
            required: false,
        }
    }

    /// Loader for an explicit file, which must exist.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// Loader honoring `RDCACHE_CONFIG_PATH`, else the current directory.
    ///
    /// `.env` files in the current directory are loaded first, so they can
    /// set the path.
    pub fn from_env() -> Result<Self, ConfigError> {
        Environment::init()?;
        Ok(match Environment::get(vars::RDCACHE_CONFIG_PATH) {
            Some(path) if !path.is_empty() => Self::at(path),
            _ => Self::default(),
        })
    }

    /// File this loader reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, expand `${VAR}` references, apply overrides and validate.
    pub fn load(&self) -> Result<RdcacheConfig, ConfigError> {
        if !self.path.exists() {
            if self.required {
                return Err(ConfigError::NotFound {
                    path: self.path.clone(),
                });
            }
            debug!(path = %self.path.display(), "no config file, using defaults");
            let mut config = RdcacheConfig::default();
            self.apply_overrides(&mut config);
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let mut config = self.parse(&contents)?;
        self.apply_overrides(&mut config);
        self.validate(&config)?;

        debug!(
            path = %self.path.display(),
            enabled = config.cache.enabled,
            connections = config.connections.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Parse YAML text after variable expansion.
    pub fn parse(&self, contents: &str) -> Result<RdcacheConfig, ConfigError> {
        let expanded = self.expand_env_vars(contents)?;
        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(ENV_PATTERN).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        let mut result = String::with_capacity(content.len());
        let mut last = 0;
        for cap in re.captures_iter(content) {
            let Some(whole) = cap.get(0) else { continue };
            let var_name = &cap[1];

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result.push_str(&content[last..whole.start()]);
            result.push_str(&value);
            last = whole.end();
        }
        result.push_str(&content[last..]);

        Ok(result)
    }

    /// `RDCACHE_ENABLED` switches the cache on or off regardless of the file.
    fn apply_overrides(&self, config: &mut RdcacheConfig) {
        if let Some(enabled) = Environment::get_bool(vars::RDCACHE_ENABLED) {
            config.cache.enabled = enabled;
        }
    }

    /// Validate configuration values.
    fn validate(&self, config: &RdcacheConfig) -> Result<(), ConfigError> {
        if config.cache.connection.trim().is_empty() {
            return Err(invalid("cache.connection must not be empty"));
        }

        if let Some(score) = config.cache.defaults.score {
            if !score.is_finite() {
                return Err(invalid("cache.defaults.score must be a finite number"));
            }
        }

        for (name, connection) in &config.connections {
            if connection.host.trim().is_empty() {
                return Err(invalid(format!("connections.{name}.host must not be empty")));
            }
            if connection.port == 0 {
                return Err(invalid(format!("connections.{name}.port must be greater than 0")));
            }
            if connection.db < 0 {
                return Err(invalid(format!("connections.{name}.db must not be negative")));
            }
        }

        Ok(())
    }

    /// Save configuration to the loader's file.
    pub fn save(&self, config: &RdcacheConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(&self.path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}
