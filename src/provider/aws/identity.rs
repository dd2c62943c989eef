//! # AWS Caller Identity
//!
//! Resolves the account the process runs in through STS `GetCallerIdentity`.
//! The rotation function ARN is derived from it when the deployment does
//! not configure an account id.

use crate::provider::AccountIdentityProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::Client as StsClient;
use tracing::debug;

/// STS-backed account lookup
pub struct AwsCallerIdentity {
    client: StsClient,
}

impl std::fmt::Debug for AwsCallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCallerIdentity").finish_non_exhaustive()
    }
}

impl AwsCallerIdentity {
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: StsClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl AccountIdentityProvider for AwsCallerIdentity {
    async fn account_id(&self) -> Result<String> {
        let response = self
            .client
            .get_caller_identity()
            .send()
            .await
            .context("Failed to get AWS caller identity")?;
        let account = response
            .account()
            .filter(|a| !a.is_empty())
            .context("Caller identity has no account id")?;
        debug!(account_id = %account, "Resolved caller identity");
        Ok(account.to_string())
    }
}
