//! Environment variable handling.

use std::env;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    pub const RDCACHE_CONFIG_PATH: &str = "RDCACHE_CONFIG_PATH";
    pub const RDCACHE_ENABLED: &str = "RDCACHE_ENABLED";
    pub const RDCACHE_ENV: &str = "RDCACHE_ENV";
}

/// Process environment access.
pub struct Environment;

impl Environment {
    /// Load `.env`, `.env.local` and `.env.$RDCACHE_ENV` from the current
    /// directory when present.
    ///
    /// Variables already set in the process win over file contents. Missing
    /// files are skipped; unreadable or malformed ones are errors.
    pub fn init() -> Result<(), EnvError> {
        Self::load_file(".env")?;
        Self::load_file(".env.local")?;

        if let Some(name) = Self::get(vars::RDCACHE_ENV) {
            Self::load_file(format!(".env.{name}"))?;
        }
        Ok(())
    }

    /// Load one env file. A missing file is not an error.
    pub fn load_file(path: impl AsRef<Path>) -> Result<(), EnvError> {
        let path = path.as_ref();
        match dotenvy::from_path(path) {
            Ok(()) => {
                debug!(path = %path.display(), "env file loaded");
                Ok(())
            }
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a boolean variable. Anything other than a true-ish word is false.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
    }
}
