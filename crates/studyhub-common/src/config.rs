//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration from environment.
///
/// Called once at application startup. Later calls return the first configuration.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("store.backend", "memory")?
        .set_default("store.max_batch_ops", 500)?
        .set_default("store.transaction_attempts", 5)?
        .set_default("engine.role_write_delay_ms", 250)?
        .set_default("engine.max_communities_per_user", 200)?
        .set_default("auth.identity_url", "http://localhost:9099")?
        .set_default("storage.data_dir", "./data/uploads")?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (STUDYHUB_SERVER__PORT, STUDYHUB_AUTH__JWT_SECRET, etc.)
        .add_source(
            config::Environment::with_prefix("STUDYHUB")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which document store backs the engine.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (lite mode, tests).
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Maximum number of writes accepted by a single batch.
    pub max_batch_ops: usize,
    /// How many times a conflicting transaction is attempted before giving up.
    pub transaction_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            max_batch_ops: 500,
            transaction_attempts: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Delay before the creator's Role record is written after a community is created.
    /// The store's rules for that write need the community document to be visible first.
    pub role_write_delay_ms: u64,
    pub max_communities_per_user: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            role_write_delay_ms: 250,
            max_communities_per_user: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared secret used to verify bearer tokens from the hosted auth service.
    pub jwt_secret: String,
    /// Base URL of the hosted authentication service's account API.
    pub identity_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Local directory for avatars and other blobs in lite mode.
    pub data_dir: String,
}
