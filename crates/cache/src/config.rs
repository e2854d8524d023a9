//! Redis configuration.

use serde::{Deserialize, Serialize};

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Hostname
    #[serde(default = "default_host")]
    pub host: String,
    /// Port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional password
    #[serde(default)]
    pub password: Option<String>,
    /// Logical database index
    #[serde(default)]
    pub db: Option<i64>,
}

fn default_host() -> String {
    "redis".to_string()
}

fn default_port() -> u16 {
    6379
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db: None,
        }
    }
}

impl RedisConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Connection URL in `redis://[:password@]host:port[/db]` form.
    pub fn url(&self) -> String {
        let auth = match &self.password {
            Some(password) => format!(":{}@", password),
            None => String::new(),
        };
        let db = match self.db {
            Some(db) => format!("/{}", db),
            None => String::new(),
        };
        format!("redis://{}{}:{}{}", auth, self.host, self.port, db)
    }
}
