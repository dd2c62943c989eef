//! # Provider Modules
//!
//! Credential store backends.
//!
//! Each backend implements one of:
//! - `SecretManagerProvider` for managed, rotatable secrets (system roles,
//!   and the admin connection secret)
//! - `ParameterStoreProvider` for encrypted parameters (plain roles)
//!
//! `AccountIdentityProvider` answers which AWS account the process runs in.

use anyhow::Result;
use async_trait::async_trait;

/// Provider trait for managed secret stores
#[async_trait]
pub trait SecretManagerProvider: Send + Sync {
    /// Create a new secret holding `secret_value`
    async fn create_secret(&self, secret_name: &str, secret_value: &str) -> Result<()>;

    /// Get the current secret value, `None` if the secret does not exist
    async fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>>;

    /// Attach an automatic rotation schedule and rotate immediately
    ///
    /// # Arguments
    /// * `secret_name` - Name of the secret
    /// * `rotation_function_arn` - ARN of the function that performs the rotation
    /// * `rotate_after_days` - Rotation interval
    async fn schedule_rotation(
        &self,
        secret_name: &str,
        rotation_function_arn: &str,
        rotate_after_days: i64,
    ) -> Result<()>;

    /// Delete a secret immediately, without a recovery window
    async fn delete_secret(&self, secret_name: &str) -> Result<()>;
}

/// Provider trait for encrypted parameter stores
#[async_trait]
pub trait ParameterStoreProvider: Send + Sync {
    /// Write an encrypted parameter, overwriting any existing value
    async fn put_secure_string(&self, name: &str, value: &str) -> Result<()>;

    /// Delete parameters by full name
    ///
    /// Returns the names the store reported as not found.
    async fn delete_parameters(&self, names: &[String]) -> Result<Vec<String>>;
}

/// Provider trait for the identity behind the process's credentials
#[async_trait]
pub trait AccountIdentityProvider: Send + Sync {
    /// AWS account id of the caller
    async fn account_id(&self) -> Result<String>;
}

// Provider implementations
pub mod aws;
