//! Process configuration.
//!
//! Sources, later wins: built-in defaults, optional `backoffice.toml`, then
//! `BACKOFFICE__<SECTION>__<KEY>` environment variables (a `.env` file is
//! loaded into the environment first).

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use backoffice_auth::JwtConfig;
use backoffice_observability::LogConfig;
use backoffice_tenancy::TenantResolverConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub tenancy: TenantResolverConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// No `url` means the in-memory store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

impl AppConfig {
    pub const FILE: &'static str = "backoffice";
    pub const ENV_PREFIX: &'static str = "BACKOFFICE";

    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name(Self::FILE).required(false))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }
}
