//! # Credential Store
//!
//! Where a role's generated password lives once the role exists.
//!
//! - Plain roles get a SecureString parameter at
//!   `/{app}/{env}/db-temp-password/{role}`.
//! - System roles get a Secrets Manager secret named `{app}-{env}-rds-{role}`
//!   holding the password, the username and the connection metadata of the
//!   admin secret, with automatic rotation attached.
//!
//! Every operation here is best-effort: failures are logged, counted and
//! returned as [`OperationOutcome`]s, never as errors.

use crate::constants::{RDS_SECRET_SEGMENT, TEMP_PASSWORD_PATH_SEGMENT};
use crate::database::DbConnectionInfo;
use crate::observability::metrics;
use crate::provider::{ParameterStoreProvider, SecretManagerProvider};
use crate::reconciler::report::{OperationKind, OperationOutcome};
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const PARAMETER_STORE: &str = "parameter_store";
const SECRETS_MANAGER: &str = "secrets_manager";

/// Both credential stores plus the naming and rotation settings
#[derive(Clone)]
pub struct CredentialStore {
    app_name: String,
    parameters: Arc<dyn ParameterStoreProvider>,
    secrets: Arc<dyn SecretManagerProvider>,
    rotation_function_arn: Option<String>,
    rotation_days: i64,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("app_name", &self.app_name)
            .field("rotation_function_arn", &self.rotation_function_arn)
            .field("rotation_days", &self.rotation_days)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(
        app_name: impl Into<String>,
        parameters: Arc<dyn ParameterStoreProvider>,
        secrets: Arc<dyn SecretManagerProvider>,
        rotation_function_arn: Option<String>,
        rotation_days: i64,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            parameters,
            secrets,
            rotation_function_arn,
            rotation_days,
        }
    }

    /// `/{app}/{env}/db-temp-password/{role}`
    #[must_use]
    pub fn parameter_name(&self, env: &str, role_name: &str) -> String {
        format!(
            "/{}/{env}/{TEMP_PASSWORD_PATH_SEGMENT}/{role_name}",
            self.app_name
        )
    }

    /// `{app}-{env}-rds-{role}`
    #[must_use]
    pub fn secret_name(&self, env: &str, role_name: &str) -> String {
        format!("{}-{env}-{RDS_SECRET_SEGMENT}-{role_name}", self.app_name)
    }

    /// Write a plain role's password as a SecureString, overwriting any previous value
    pub async fn store_parameter(&self, env: &str, role_name: &str, password: &str) -> OperationOutcome {
        let name = self.parameter_name(env, role_name);
        debug!(role = %role_name, parameter = %name, "Storing temporary password parameter");

        let result = self
            .parameters
            .put_secure_string(&name, password)
            .await
            .with_context(|| format!("Failed to store parameter {name}"));
        if result.is_err() {
            metrics::increment_credential_operation_errors(PARAMETER_STORE);
        }
        OperationOutcome::from_result(OperationKind::StoreParameter, name, &result)
    }

    /// Delete the parameters of every given role in batches; a no-op for an empty list
    pub async fn delete_parameters<S: AsRef<str>>(&self, env: &str, role_names: &[S]) -> Vec<OperationOutcome> {
        if role_names.is_empty() {
            return Vec::new();
        }
        let names: Vec<String> = role_names
            .iter()
            .map(|r| self.parameter_name(env, r.as_ref()))
            .collect();
        let target = names.join(",");

        match self.parameters.delete_parameters(&names).await {
            Ok(not_found) => {
                if !not_found.is_empty() {
                    // Already gone; nothing left to clean up
                    warn!(parameters = ?not_found, "Parameters to delete were not found");
                }
                info!(count = names.len().saturating_sub(not_found.len()), "Deleted temporary password parameters");
                vec![OperationOutcome::success(OperationKind::DeleteParameters, target)]
            }
            Err(e) => {
                metrics::increment_credential_operation_errors(PARAMETER_STORE);
                vec![OperationOutcome::failure(OperationKind::DeleteParameters, target, &e)]
            }
        }
    }

    /// Create a system role's secret, then attach rotation
    ///
    /// The two calls are independent: a failed rotation schedule leaves the
    /// secret in place, and rotation is attempted even if creation failed
    /// because the secret may already exist from an earlier run.
    pub async fn store_managed_secret(
        &self,
        env: &str,
        role_name: &str,
        password: &str,
        connection: &DbConnectionInfo,
    ) -> Vec<OperationOutcome> {
        let name = self.secret_name(env, role_name);
        let mut outcomes = Vec::with_capacity(2);

        let mut payload = connection.connection_metadata();
        payload.insert("password".to_string(), Value::from(password));
        payload.insert("username".to_string(), Value::from(role_name));
        let secret_string = Zeroizing::new(Value::Object(payload).to_string());

        let created = self
            .secrets
            .create_secret(&name, &secret_string)
            .await
            .with_context(|| format!("Failed to create secret {name}"));
        if created.is_err() {
            metrics::increment_credential_operation_errors(SECRETS_MANAGER);
        } else {
            info!(role = %role_name, secret = %name, "Stored system role secret");
        }
        outcomes.push(OperationOutcome::from_result(OperationKind::StoreSecret, name.clone(), &created));

        let scheduled = match self.rotation_function_arn.as_deref() {
            Some(arn) => self
                .secrets
                .schedule_rotation(&name, arn, self.rotation_days)
                .await
                .with_context(|| format!("Failed to schedule rotation for {name}")),
            None => Err(anyhow::anyhow!(
                "no rotation function configured; set ROTATION_FUNCTION_ARN or AWS_ACCOUNT_ID"
            )),
        };
        if scheduled.is_err() {
            metrics::increment_credential_operation_errors(SECRETS_MANAGER);
        }
        outcomes.push(OperationOutcome::from_result(OperationKind::ScheduleRotation, name, &scheduled));

        outcomes
    }

    /// Force-delete one system role's secret
    pub async fn delete_managed_secret(&self, env: &str, role_name: &str) -> OperationOutcome {
        let name = self.secret_name(env, role_name);
        let result = self
            .secrets
            .delete_secret(&name)
            .await
            .with_context(|| format!("Failed to delete secret {name}"));
        if result.is_err() {
            metrics::increment_credential_operation_errors(SECRETS_MANAGER);
        } else {
            info!(role = %role_name, secret = %name, "Deleted system role secret");
        }
        OperationOutcome::from_result(OperationKind::DeleteSecret, name, &result)
    }

    /// Delete the secrets of several system roles, one at a time
    pub async fn delete_managed_secrets<S: AsRef<str>>(&self, env: &str, role_names: &[S]) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::with_capacity(role_names.len());
        for role_name in role_names {
            outcomes.push(self.delete_managed_secret(env, role_name.as_ref()).await);
        }
        outcomes
    }
}
