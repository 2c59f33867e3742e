use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_DIR: &str = ".labdesk";
const DEFAULT_MOCK_HOST: &str = "127.0.0.1";
const DEFAULT_MOCK_PORT: u16 = 8000;
const CONFIG_DIR: &str = "config";

/// Seller block printed on quotation documents.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SellerConfig {
    #[validate(length(min = 1))]
    pub company_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub gstin: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Prefix for generated quotation numbers, e.g. "EC/2425/QU"
    #[serde(default = "default_quotation_prefix")]
    pub quotation_prefix: String,
}

impl Default for SellerConfig {
    fn default() -> Self {
        Self {
            company_name: "LabDesk Laboratory".to_string(),
            address: String::new(),
            gstin: String::new(),
            email: String::new(),
            phone: String::new(),
            quotation_prefix: default_quotation_prefix(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the laboratory REST API
    #[validate(custom = "validate_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds (1 - 300)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Directory holding the persisted CLI session
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// State GST percentage applied on quotation documents
    #[serde(default = "default_gst_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub sgst_rate: Decimal,

    /// Central GST percentage applied on quotation documents
    #[serde(default = "default_gst_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub cgst_rate: Decimal,

    /// Bind address of the bundled mock API server
    #[serde(default = "default_mock_host")]
    pub mock_server_host: String,

    #[serde(default = "default_mock_port")]
    pub mock_server_port: u16,

    #[serde(default)]
    #[validate]
    pub seller: SellerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            session_dir: default_session_dir(),
            sgst_rate: default_gst_rate(),
            cgst_rate: default_gst_rate(),
            mock_server_host: default_mock_host(),
            mock_server_port: DEFAULT_MOCK_PORT,
            seller: SellerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_file(&self) -> PathBuf {
        Path::new(&self.session_dir).join("session.json")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_session_dir() -> String {
    DEFAULT_SESSION_DIR.to_string()
}

fn default_gst_rate() -> Decimal {
    dec!(9)
}

fn default_mock_host() -> String {
    DEFAULT_MOCK_HOST.to_string()
}

fn default_mock_port() -> u16 {
    DEFAULT_MOCK_PORT
}

fn default_quotation_prefix() -> String {
    "LD/QU".to_string()
}

fn validate_api_base_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("api_base_url");
            err.message = Some("api_base_url must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

/// Validates log level values
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

fn validate_tax_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if rate.is_sign_negative() || *rate > dec!(100) {
        let mut err = ValidationError::new("gst_rate");
        err.message = Some("GST rates are percentages between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("labdesk={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // CLI output goes to stdout, so logs are kept on stderr.
    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.session_file(), Path::new(".labdesk").join("session.json"));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let cfg = AppConfig {
            api_base_url: "localhost:8000".into(),
            ..AppConfig::default()
        };
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("api_base_url"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cfg = AppConfig {
            request_timeout_secs: 0,
            sgst_rate: dec!(-1),
            log_level: "verbose".into(),
            ..AppConfig::default()
        };
        let errors = cfg.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("request_timeout_secs"));
        assert!(fields.contains_key("sgst_rate"));
        assert!(fields.contains_key("log_level"));
    }
}
