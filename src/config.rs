//! Database configuration.
//!
//! [`DatabaseConfig::load`] reads the `[database]` table from
//! `config/config.toml` and `ELOQUENT__DATABASE__*` environment variables.

use crate::executor::Dialect;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "ELOQUENT";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default)]
    pub dialect: Dialect,
}

fn default_db_url() -> String {
    ":memory:".to_string()
}

impl DatabaseConfig {
    /// Load the database configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // A present but unreadable file is worth a warning; retry with env only
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("Failed to load config file, falling back to env. Error: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    /// Extract the `database` table from already-built settings
    pub fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        // A missing section means every field takes its default
        if settings.get_table("database").is_err() {
            return Ok(Self {
                url: default_db_url(),
                dialect: Dialect::default(),
            });
        }
        settings.get::<DatabaseConfig>("database").map_err(|e| {
            ConfigError::Message(format!(
                "Database configuration could not be loaded from file or environment: {e}"
            ))
        })
    }
}
