use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::properties::PropertyStoreConfig;

// ──────────────────────────── TOML structure ────────────────────────────

#[derive(Debug, Deserialize, Clone)]
pub struct TomlConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub property_store: PropertyStoreSection,
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            version: default_version(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_algorithm: String,
    #[serde(default)]
    pub bypass_auth_mode: bool,
    #[serde(default = "default_dev_user_id")]
    pub dev_user_id: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

fn default_dev_user_id() -> String {
    "dev_user".to_string()
}
fn default_login_url() -> String {
    "/accounts/login/".to_string()
}
fn default_session_cookie() -> String {
    "session".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub provider: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PropertyStoreSection {
    pub provider: String,
    #[serde(default = "default_analysis_table")]
    pub table: String,
    #[serde(default = "default_store_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_analysis_table() -> String {
    "analysis".to_string()
}
fn default_store_pool_size() -> u32 {
    5
}
fn default_acquire_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub provider: String,
    #[serde(default)]
    pub storage_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_broadcast_url")]
    pub broadcast_url: String,
    #[serde(default = "default_pipeline_timeout")]
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broadcast_url: default_broadcast_url(),
            timeout_secs: default_pipeline_timeout(),
        }
    }
}

fn default_broadcast_url() -> String {
    "http://localhost:5555/broadcast".to_string()
}
fn default_pipeline_timeout() -> u64 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

// ──────────────────────────── Resolved Settings ────────────────────────────

/// Flat settings structure resolved from TOML + environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    // API
    pub host: String,
    pub port: u16,

    // Service
    pub environment: String,
    pub version: String,

    // Auth
    pub jwt_algorithm: String,
    pub jwt_secret_key: String,
    pub bypass_auth_mode: bool,
    pub dev_user_id: String,
    pub login_url: String,
    pub session_cookie: String,

    // Database
    pub database_provider: String,
    pub postgres_uri: Option<String>,
    pub db_pool_size: u32,

    // Property store
    pub property_store_provider: String,
    pub property_store: PropertyStoreConfig,

    // Storage
    pub storage_provider: String,
    pub storage_path: String,

    // Pipeline
    pub pipeline_enabled: bool,
    pub pipeline_broadcast_url: String,
    pub pipeline_timeout: Duration,

    // Upload
    pub max_upload_bytes: usize,
}

impl Settings {
    /// Settings for in-process use: memory backends, bypassed auth disabled.
    #[cfg(test)]
    pub fn for_tests(storage_path: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            version: "test".to_string(),
            jwt_algorithm: "HS256".to_string(),
            jwt_secret_key: "test-secret".to_string(),
            bypass_auth_mode: false,
            dev_user_id: default_dev_user_id(),
            login_url: default_login_url(),
            session_cookie: default_session_cookie(),
            database_provider: "memory".to_string(),
            postgres_uri: None,
            db_pool_size: 1,
            property_store_provider: "memory".to_string(),
            property_store: PropertyStoreConfig {
                uri: None,
                table: default_analysis_table(),
                pool_size: 1,
                acquire_timeout: Duration::from_secs(1),
            },
            storage_provider: "local".to_string(),
            storage_path: storage_path.to_string(),
            pipeline_enabled: false,
            pipeline_broadcast_url: default_broadcast_url(),
            pipeline_timeout: Duration::from_secs(1),
            max_upload_bytes: 1024 * 1024,
        }
    }
}

/// Load settings from a given TOML path and the process environment.
pub fn load_settings_from_path(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    let content = std::fs::read_to_string(path.as_ref())?;
    let config: TomlConfig = toml::from_str(&content)?;

    let jwt_secret_key =
        std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| "dev-secret-key".to_string());

    if !config.auth.bypass_auth_mode && jwt_secret_key == "dev-secret-key" {
        anyhow::bail!("JWT_SECRET_KEY is required when bypass_auth_mode is disabled");
    }

    let needs_postgres =
        config.database.provider == "postgres" || config.property_store.provider == "postgres";
    let postgres_uri = if needs_postgres {
        Some(std::env::var("POSTGRES_URI").map_err(|_| {
            anyhow::anyhow!("POSTGRES_URI environment variable is required for postgres providers")
        })?)
    } else {
        std::env::var("POSTGRES_URI").ok()
    };

    let property_store = PropertyStoreConfig {
        uri: postgres_uri.clone(),
        table: config.property_store.table,
        pool_size: config.property_store.pool_size,
        acquire_timeout: Duration::from_secs(config.property_store.acquire_timeout_secs),
    };

    Ok(Settings {
        host: config.api.host,
        port: config.api.port,
        environment: config.service.environment,
        version: config.service.version,
        jwt_algorithm: config.auth.jwt_algorithm,
        jwt_secret_key,
        bypass_auth_mode: config.auth.bypass_auth_mode,
        dev_user_id: config.auth.dev_user_id,
        login_url: config.auth.login_url,
        session_cookie: config.auth.session_cookie,
        database_provider: config.database.provider,
        postgres_uri,
        db_pool_size: config.database.pool_size,
        property_store_provider: config.property_store.provider,
        property_store,
        storage_provider: config.storage.provider,
        storage_path: config
            .storage
            .storage_path
            .unwrap_or_else(|| "./storage".to_string()),
        pipeline_enabled: config.pipeline.enabled,
        pipeline_broadcast_url: config.pipeline.broadcast_url,
        pipeline_timeout: Duration::from_secs(config.pipeline.timeout_secs),
        max_upload_bytes: config.upload.max_upload_bytes,
    })
}
