//! Connection settings.

use redis::IntoConnectionInfo;
use serde::{Deserialize, Serialize};

/// Settings for one Redis connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Password, empty for none.
    pub password: String,
    /// Database index.
    pub db: i64,
    /// Prefix joined to every key with `:`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            prefix: None,
        }
    }
}

impl ConnectionConfig {
    /// Server address as a URL, without credentials.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }

    /// Connection details for the `redis` client.
    ///
    /// The password is set on the parsed info rather than embedded in the URL,
    /// so it may contain any character.
    pub fn connection_info(&self) -> redis::RedisResult<redis::ConnectionInfo> {
        let mut info = self.url().as_str().into_connection_info()?;
        if !self.password.is_empty() {
            info.redis.password = Some(self.password.clone());
        }
        Ok(info)
    }

    /// Builder-style password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Builder-style host override.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Builder-style port override.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder-style database override.
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Builder-style key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}
