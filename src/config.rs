use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_BUSINESS_HOURS_START: u32 = 6;
const DEFAULT_BUSINESS_HOURS_END: u32 = 22;
const DEFAULT_EXPIRATION_WINDOW_DAYS: i64 = 15;
const DEFAULT_DEPLETION_SENTINEL_DAYS: i64 = 999;

/// Tunables for the anomaly-detection engine
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Offset applied to UTC timestamps when classifying business hours
    #[serde(default)]
    pub utc_offset_hours: i32,

    /// Start of the normal payment window (local hour, inclusive)
    #[serde(default = "default_business_hours_start")]
    #[validate(range(max = 23))]
    pub business_hours_start: u32,

    /// End of the normal payment window (local hour, exclusive)
    #[serde(default = "default_business_hours_end")]
    #[validate(range(max = 24))]
    pub business_hours_end: u32,

    /// How far ahead the expiration detector looks, in days
    #[serde(default = "default_expiration_window_days")]
    pub expiration_window_days: i64,

    /// Days-until-depletion reported when stock exists but nothing moves out
    #[serde(default = "default_depletion_sentinel_days")]
    pub depletion_sentinel_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 0,
            business_hours_start: DEFAULT_BUSINESS_HOURS_START,
            business_hours_end: DEFAULT_BUSINESS_HOURS_END,
            expiration_window_days: DEFAULT_EXPIRATION_WINDOW_DAYS,
            depletion_sentinel_days: DEFAULT_DEPLETION_SENTINEL_DAYS,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    #[validate(range(min = 1))]
    pub db_min_connections: u32,

    /// Detection engine tunables
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_business_hours_start() -> u32 {
    DEFAULT_BUSINESS_HOURS_START
}

fn default_business_hours_end() -> u32 {
    DEFAULT_BUSINESS_HOURS_END
}

fn default_expiration_window_days() -> i64 {
    DEFAULT_EXPIRATION_WINDOW_DAYS
}

fn default_depletion_sentinel_days() -> i64 {
    DEFAULT_DEPLETION_SENTINEL_DAYS
}

impl AppConfig {
    /// Build a configuration programmatically (used by tests and tools)
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            analysis: AnalysisConfig::default(),
        }
    }

    /// Load configuration from `config/{default,<env>}.toml` layered with
    /// `MOTORENT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(Environment::with_prefix("MOTORENT").separator("__"))
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(app)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
