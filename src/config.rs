use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
/// Discrepancy percentage above which a recount raises an admin alert.
const DEFAULT_DISCREPANCY_ALERT_THRESHOLD: f64 = 5.0;

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (postgres:// in production, sqlite:// in tests)
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON (useful under a log collector)
    #[serde(default)]
    pub log_json: bool,

    /// Run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Recount discrepancy percentage that triggers the admin alert event.
    #[serde(default = "default_discrepancy_alert_threshold")]
    #[validate(range(min = 0.0))]
    pub discrepancy_alert_threshold: f64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_discrepancy_alert_threshold() -> f64 {
    DEFAULT_DISCREPANCY_ALERT_THRESHOLD
}

impl AppConfig {
    /// Programmatic constructor, used by tests and tooling.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            discrepancy_alert_threshold: default_discrepancy_alert_threshold(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Load layered configuration: config/default.toml, then
/// config/{environment}.toml, then APP_* environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let environment =
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .add_source(File::from(Path::new(CONFIG_DIR).join("default")).required(false))
        .add_source(File::from(Path::new(CONFIG_DIR).join(&environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    // DATABASE_URL is the conventional deployment override.
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database_url", url)?;
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    info!(environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}

/// Install the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shopfloor_api={level},tower_http=info")));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
