//! # Manager Configuration
//!
//! Role manager settings loaded from environment variables.

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_DB_CONNECT_TIMEOUT_SECS, DEFAULT_DB_MAX_CONNECTIONS,
    DEFAULT_PASSWORD_LENGTH, DEFAULT_REGION, DEFAULT_ROTATION_DAYS, DEFAULT_STAGE,
    MIN_PASSWORD_LENGTH, RDS_SECRET_SEGMENT,
};
use std::time::Duration;

/// Role manager configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// The Lambda deployment sets `STAGE` and `DATABASE_SECRET_ARN`; everything else is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Application name, first segment of every credential path and secret name
    pub app_name: String,
    /// Stage / environment name (e.g. "dev", "impl", "prod")
    pub stage: String,
    /// AWS region of the credential stores and the rotation function
    pub region: String,
    /// AWS account id; needed to derive the rotation function ARN.
    /// Resolved from the caller identity at startup when unset.
    pub account_id: Option<String>,
    /// Secret id (name or ARN) of the RDS admin secret used to connect to the database
    pub database_secret_id: String,
    /// Explicit rotation function ARN; derived from account/region/stage when unset
    pub rotation_function_arn: Option<String>,
    /// Automatic rotation interval for system-role secrets (days)
    pub rotation_days: i64,
    /// Length of generated temporary passwords
    pub password_length: usize,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Database connection acquire timeout (seconds)
    pub db_connect_timeout_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            stage: DEFAULT_STAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
            account_id: None,
            database_secret_id: default_database_secret_id(DEFAULT_APP_NAME, DEFAULT_STAGE),
            rotation_function_arn: None,
            rotation_days: DEFAULT_ROTATION_DAYS,
            password_length: DEFAULT_PASSWORD_LENGTH,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let app_name = env_var_or_default_str("APP_NAME", DEFAULT_APP_NAME);
        let stage = env_var_or_default_str("STAGE", DEFAULT_STAGE);
        let database_secret_id = std::env::var("DATABASE_SECRET_ARN")
            .unwrap_or_else(|_| default_database_secret_id(&app_name, &stage));

        Self {
            region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            account_id: non_empty_env("AWS_ACCOUNT_ID"),
            database_secret_id,
            rotation_function_arn: non_empty_env("ROTATION_FUNCTION_ARN"),
            rotation_days: env_var_or_default("ROTATION_DAYS", DEFAULT_ROTATION_DAYS),
            password_length: env_var_or_default("PASSWORD_LENGTH", DEFAULT_PASSWORD_LENGTH)
                .max(MIN_PASSWORD_LENGTH),
            db_max_connections: env_var_or_default(
                "DB_MAX_CONNECTIONS",
                DEFAULT_DB_MAX_CONNECTIONS,
            ),
            db_connect_timeout_secs: env_var_or_default(
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            app_name,
            stage,
        }
    }

    /// ARN of the function that rotates system-role secrets
    ///
    /// `arn:aws:lambda:{region}:{account}:function:{app}-{stage}-rds-rotation`
    /// unless overridden. `None` while no account id is known.
    #[must_use]
    pub fn rotation_function_arn(&self) -> Option<String> {
        if let Some(arn) = &self.rotation_function_arn {
            return Some(arn.clone());
        }
        self.account_id.as_ref().map(|account| {
            format!(
                "arn:aws:lambda:{}:{account}:function:{}-{}-{RDS_SECRET_SEGMENT}-rotation",
                self.region, self.app_name, self.stage
            )
        })
    }

    /// Get database connection acquire timeout
    #[must_use]
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }
}

fn default_database_secret_id(app_name: &str, stage: &str) -> String {
    format!("{app_name}-{stage}-{RDS_SECRET_SEGMENT}-admin")
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
