//! Runtime configuration.
//!
//! Read (in increasing order of precedence) from built-in defaults,
//! `workshops.toml`, `WORKSHOPS_`-prefixed environment variables and finally
//! `DATABASE_URL`.

use db::PoolConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "workshops.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub pool_size: u32,
    /// Seconds to wait for a database connection.
    pub timeout: u64,
    /// A `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes priority.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite.db".to_string(),
            pool_size: 10,
            timeout: 5,
            log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("WORKSHOPS_"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn load() -> Result<Config> {
        Ok(Self::figment().extract().map_err(Box::new)?)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database_url.clone(),
            pool_size: self.pool_size,
            timeout: self.timeout,
        }
    }
}
