//! # AWS Parameter Store Client
//!
//! Client for interacting with AWS Systems Manager Parameter Store API.
//!
//! Plain roles get their temporary password as a `SecureString`
//! parameter, overwritten on re-provisioning and removed in batches when
//! the role goes away.

use crate::constants::SSM_DELETE_PARAMETERS_BATCH;
use crate::provider::ParameterStoreProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client as SsmClient;
use std::future::Future;
use tracing::{debug, info};

/// AWS Parameter Store provider implementation
pub struct AwsParameterStore {
    client: SsmClient,
}

impl std::fmt::Debug for AwsParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsParameterStore").finish_non_exhaustive()
    }
}

impl AwsParameterStore {
    /// Create a new AWS Parameter Store client from a loaded SDK config
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SsmClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl ParameterStoreProvider for AwsParameterStore {
    async fn put_secure_string(&self, name: &str, value: &str) -> Result<()> {
        info!("Writing AWS Parameter Store parameter: {}", name);
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send()
            .await
            .with_context(|| format!("Failed to write AWS Parameter Store parameter {name}"))?;
        Ok(())
    }

    async fn delete_parameters(&self, names: &[String]) -> Result<Vec<String>> {
        delete_in_batches(names, |batch| async move {
            info!("Deleting AWS Parameter Store parameters: {:?}", batch);
            let response = self
                .client
                .delete_parameters()
                .set_names(Some(batch))
                .send()
                .await
                .context("Failed to delete AWS Parameter Store parameters")?;
            Ok(response.invalid_parameters().to_vec())
        })
        .await
    }
}

/// Run `delete_batch` over `names` in chunks DeleteParameters accepts
///
/// Collects the names each batch reports as not found. Stops at the first
/// failed batch.
async fn delete_in_batches<F, Fut>(names: &[String], mut delete_batch: F) -> Result<Vec<String>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<String>>>,
{
    let mut not_found = Vec::new();
    // DeleteParameters accepts at most ten names per call
    for chunk in names.chunks(SSM_DELETE_PARAMETERS_BATCH) {
        let invalid = delete_batch(chunk.to_vec()).await?;
        if !invalid.is_empty() {
            debug!("Parameters not found while deleting: {:?}", invalid);
            not_found.extend(invalid);
        }
    }
    Ok(not_found)
}
