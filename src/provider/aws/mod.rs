//! # AWS Secrets Manager Client
//!
//! Client for interacting with AWS Secrets Manager API.
//!
//! This module provides functionality to:
//! - Create system-role secrets and attach their rotation schedule
//! - Retrieve secret values (the RDS admin secret)
//! - Force-delete secrets of removed roles
//!
//! Credentials come from the default provider chain (the Lambda execution
//! role when deployed).

use crate::provider::SecretManagerProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::types::RotationRulesType;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Load the shared AWS SDK config for `region` from the default credential chain
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
}

/// AWS Secrets Manager provider implementation
pub struct AwsSecretManager {
    client: SecretsManagerClient,
    region: String,
}

impl std::fmt::Debug for AwsSecretManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretManager")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSecretManager {
    /// Create a new AWS Secrets Manager client from a loaded SDK config
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let region = sdk_config
            .region()
            .map_or_else(String::new, ToString::to_string);
        Self {
            client: SecretsManagerClient::new(sdk_config),
            region,
        }
    }
}

#[async_trait]
impl SecretManagerProvider for AwsSecretManager {
    async fn create_secret(&self, secret_name: &str, secret_value: &str) -> Result<()> {
        let span = info_span!(
            "aws.secret.create",
            secret.name = secret_name,
            region = %self.region,
            operation.duration_ms = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            info!("Creating AWS secret: {}", secret_name);
            let result = self
                .client
                .create_secret()
                .name(secret_name)
                .secret_string(secret_value)
                .send()
                .await;
            span_clone.record(
                "operation.duration_ms",
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
            result
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!("Failed to create AWS secret {secret_name}: {e}"))
        }
        .instrument(span)
        .await
    }

    async fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>> {
        let span = tracing::debug_span!("aws.secret.get", secret.id = secret_id, region = %self.region);

        async move {
            match self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .send()
                .await
            {
                Ok(response) => {
                    let value = response
                        .secret_string()
                        .map(ToString::to_string)
                        .or_else(|| {
                            response
                                .secret_binary()
                                .map(|blob| String::from_utf8_lossy(blob.as_ref()).to_string())
                        });
                    match value {
                        Some(v) => Ok(Some(v)),
                        None => Err(anyhow::anyhow!("Secret has no string or binary value")),
                    }
                }
                Err(e) => {
                    let service_error = e.into_service_error();
                    if service_error.is_resource_not_found_exception() {
                        debug!("AWS secret {} not found", secret_id);
                        Ok(None)
                    } else {
                        Err(anyhow::anyhow!(
                            "Failed to get AWS secret {secret_id}: {service_error}"
                        ))
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn schedule_rotation(
        &self,
        secret_name: &str,
        rotation_function_arn: &str,
        rotate_after_days: i64,
    ) -> Result<()> {
        info!(
            "Scheduling rotation for AWS secret {} every {} days",
            secret_name, rotate_after_days
        );
        self.client
            .rotate_secret()
            .secret_id(secret_name)
            .rotation_lambda_arn(rotation_function_arn)
            .rotation_rules(
                RotationRulesType::builder()
                    .automatically_after_days(rotate_after_days)
                    .build(),
            )
            .rotate_immediately(true)
            .send()
            .await
            .with_context(|| format!("Failed to schedule rotation for AWS secret {secret_name}"))?;
        Ok(())
    }

    async fn delete_secret(&self, secret_name: &str) -> Result<()> {
        info!("Deleting AWS secret: {}", secret_name);
        self.client
            .delete_secret()
            .secret_id(secret_name)
            .force_delete_without_recovery(true)
            .send()
            .await
            .with_context(|| format!("Failed to delete AWS secret {secret_name}"))?;
        Ok(())
    }
}

// Export Parameter Store and caller identity providers
pub mod identity;
pub mod parameter_store;
pub use identity::AwsCallerIdentity;
pub use parameter_store::AwsParameterStore;
