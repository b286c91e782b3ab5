use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_MESSAGE_QUEUE_BACKEND: &str = "in-memory";
const DEFAULT_MESSAGE_QUEUE_NAMESPACE: &str = "promo:mq";
const DEFAULT_MESSAGE_QUEUE_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_MAX_QUANTITY_TIER: i32 = 3;
const DEFAULT_MAX_TRX_THRESHOLD: i64 = 1_000_000;

/// Business rules applied by the promo engine.
///
/// `max_quantity_tier` caps the purchased quantity before tier lookup, and
/// `max_trx_threshold` is the transaction amount at which only open-ended
/// configs (no `max_trx`) are considered.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PromoRules {
    #[serde(default = "default_max_quantity_tier")]
    #[validate(range(min = 1))]
    pub max_quantity_tier: i32,

    #[serde(default = "default_max_trx_threshold")]
    #[validate(custom = "validate_positive_amount")]
    pub max_trx_threshold: Decimal,
}

impl Default for PromoRules {
    fn default() -> Self {
        Self {
            max_quantity_tier: default_max_quantity_tier(),
            max_trx_threshold: default_max_trx_threshold(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Message queue backend selection (only "in-memory" ships today)
    #[serde(default = "default_message_queue_backend")]
    #[validate(custom = "validate_message_queue_backend")]
    pub message_queue_backend: String,

    /// Namespace prefix for queue topics
    #[serde(default = "default_message_queue_namespace")]
    pub message_queue_namespace: String,

    /// How long the consumer sleeps when its topic is empty
    #[serde(default = "default_message_queue_poll_interval_ms")]
    pub message_queue_poll_interval_ms: u64,

    /// Start the `mp_transaction_point` consumer alongside the HTTP server
    #[serde(default = "default_true_bool")]
    pub consumer_enabled: bool,

    #[serde(default)]
    #[validate]
    pub promo: PromoRules,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            message_queue_backend: default_message_queue_backend(),
            message_queue_namespace: default_message_queue_namespace(),
            message_queue_poll_interval_ms: default_message_queue_poll_interval_ms(),
            consumer_enabled: true,
            promo: PromoRules::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn queue_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.message_queue_poll_interval_ms)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_message_queue_backend() -> String {
    DEFAULT_MESSAGE_QUEUE_BACKEND.to_string()
}
fn default_message_queue_namespace() -> String {
    DEFAULT_MESSAGE_QUEUE_NAMESPACE.to_string()
}
fn default_message_queue_poll_interval_ms() -> u64 {
    DEFAULT_MESSAGE_QUEUE_POLL_INTERVAL_MS
}
fn default_true_bool() -> bool {
    true
}

fn default_max_quantity_tier() -> i32 {
    DEFAULT_MAX_QUANTITY_TIER
}

fn default_max_trx_threshold() -> Decimal {
    Decimal::from(DEFAULT_MAX_TRX_THRESHOLD)
}

fn validate_message_queue_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" => Ok(()),
        _ => {
            let mut err = ValidationError::new("message_queue_backend");
            err.message = Some("Must be one of: in-memory".into());
            Err(err)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("max_trx_threshold");
        err.message = Some("max_trx_threshold must be greater than 0".into());
        Err(err)
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("promo_service={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

/// Layers `<dir>/default`, `<dir>/<RUN_ENV>` and `APP__*` variables, in that order.
pub fn load_config_from(config_dir: &str) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://promo.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        max_quantity_tier = app_config.promo.max_quantity_tier,
        max_trx_threshold = %app_config.promo.max_trx_threshold,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File as StdFile;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(content: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let mut file = StdFile::create(temp_dir.path().join("default.toml")).unwrap();
        writeln!(file, "{}", content).unwrap();
        temp_dir
    }

    #[test]
    fn promo_rules_default_values() {
        let rules = PromoRules::default();
        assert_eq!(rules.max_quantity_tier, 3);
        assert_eq!(rules.max_trx_threshold, Decimal::from(1_000_000));
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn zero_quantity_tier_is_invalid() {
        let rules = PromoRules {
            max_quantity_tier: 0,
            ..PromoRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn non_positive_threshold_is_invalid() {
        let rules = PromoRules {
            max_trx_threshold: Decimal::ZERO,
            ..PromoRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn load_config_reads_promo_section_from_file() {
        let dir = write_config(
            r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            port = 9090
            environment = "development"

            [promo]
            max_quantity_tier = 5
            max_trx_threshold = 2500000
            "#,
        );

        let config = load_config_from(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.promo.max_quantity_tier, 5);
        assert_eq!(config.promo.max_trx_threshold, Decimal::from(2_500_000));
        assert!(config.consumer_enabled);
    }

    #[test]
    fn load_config_rejects_unknown_log_level() {
        let dir = write_config(
            r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            environment = "development"
            log_level = "loud"
            "#,
        );

        let result = load_config_from(dir.path().to_str().unwrap());
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }
}
