//! # Reconciler
//!
//! Makes the database and the credential stores match a declared role set.
//!
//! The reconciler:
//! - Drops roles that disappeared from the declaration, with their credentials
//! - Validates the declaration before anything is created
//! - Creates login roles that do not exist yet and stores their passwords
//! - Syncs every declared role's group memberships
//!
//! ## Reconciliation Flow
//!
//! 1. Deletions (Update only), compared by name against the previous declaration
//! 2. Validation; a failure aborts here
//! 3. Provisioning of roles that cannot log in yet, in declaration order
//! 4. Membership sync of every declared role, one transaction each
//!
//! Only validation and role creation are fatal. Everything else is recorded
//! in the returned [`ReconcileReport`].

pub mod report;
pub mod sync;

pub use report::{OperationKind, OperationOutcome, ReconcileReport};
pub use sync::{sync_role, MembershipDiff};

use crate::credentials::CredentialStore;
use crate::database::{DbConnectionInfo, RoleStore};
use crate::error::{Result, RoleManagerError};
use crate::observability::metrics;
use crate::password;
use crate::role::{find_deleted_roles, find_system_role_changes, partition_by_system_role, Role};
use crate::validation::validate_roles;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates one declared role set against the database and credential stores
#[derive(Clone)]
pub struct RoleReconciler {
    store: Arc<dyn RoleStore>,
    credentials: CredentialStore,
    connection: Arc<DbConnectionInfo>,
    stage: String,
    password_length: usize,
}

impl std::fmt::Debug for RoleReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleReconciler")
            .field("credentials", &self.credentials)
            .field("connection", &self.connection)
            .field("stage", &self.stage)
            .field("password_length", &self.password_length)
            .finish_non_exhaustive()
    }
}

impl RoleReconciler {
    pub fn new(
        store: Arc<dyn RoleStore>,
        credentials: CredentialStore,
        connection: Arc<DbConnectionInfo>,
        stage: impl Into<String>,
        password_length: usize,
    ) -> Self {
        Self {
            store,
            credentials,
            connection,
            stage: stage.into(),
            password_length,
        }
    }

    /// Create/Update path
    ///
    /// # Errors
    ///
    /// [`RoleManagerError::Validation`] when `desired` is rejected,
    /// [`RoleManagerError::RoleCreation`] when a missing role cannot be created
    /// and [`RoleManagerError::Database`] when the login-role lookup fails.
    pub async fn apply_role_changes(
        &self,
        desired: &[Role],
        previous: Option<&[Role]>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        if let Some(previous) = previous {
            let deleted = find_deleted_roles(desired, previous);
            if deleted.is_empty() {
                debug!("No roles removed from the declaration");
            } else {
                info!(
                    roles = ?deleted.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
                    "Deleting roles removed from the declaration"
                );
                self.remove_roles(&deleted, &mut report).await;
            }

            for role in find_system_role_changes(desired, previous) {
                warn!(
                    role = %role.name,
                    system_role = role.system_role,
                    "systemRole changed; the existing credential is not moved between stores"
                );
            }
        }

        validate_roles(self.store.as_ref(), desired).await?;

        let new_roles = self
            .store
            .roles_missing_login(desired)
            .await
            .map_err(RoleManagerError::Database)?;
        if !new_roles.is_empty() {
            info!(
                roles = ?new_roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
                "Creating roles"
            );
        }
        for role in &new_roles {
            self.provision_role(role, &mut report).await?;
        }

        for role in desired {
            let outcome = sync_role(self.store.as_ref(), role).await;
            if outcome.is_success() {
                report.synced_roles.push(role.name.clone());
            }
            report.record(outcome);
        }

        info!(
            created = report.created_roles.len(),
            deleted = report.deleted_roles.len(),
            synced = report.synced_roles.len(),
            failed_operations = report.failures().count(),
            "Role changes applied"
        );
        Ok(report)
    }

    /// Delete path: drop every role, then delete every credential
    pub async fn delete_all_roles(&self, roles: &[Role]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if roles.is_empty() {
            debug!("No roles to delete");
            return report;
        }
        info!(count = roles.len(), "Deleting all declared roles");
        self.remove_roles(roles, &mut report).await;
        report
    }

    /// Drop `roles` in one statement, then clean up their credentials
    ///
    /// Credentials are deleted even when the drop fails.
    async fn remove_roles(&self, roles: &[Role], report: &mut ReconcileReport) {
        let names: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();

        let dropped = self.store.drop_roles(roles).await;
        if dropped.is_ok() {
            metrics::increment_roles_dropped(roles.len());
        }
        report.record(OperationOutcome::from_result(
            OperationKind::DropRoles,
            names.join(","),
            &dropped,
        ));
        report.deleted_roles.extend(names);

        let (plain, system) = partition_by_system_role(roles);
        let plain_names: Vec<&str> = plain.iter().map(|r| r.name.as_str()).collect();
        let system_names: Vec<&str> = system.iter().map(|r| r.name.as_str()).collect();

        report.extend(self.credentials.delete_parameters(&self.stage, &plain_names).await);
        report.extend(
            self.credentials
                .delete_managed_secrets(&self.stage, &system_names)
                .await,
        );
    }

    /// Create one login role and store its password
    async fn provision_role(&self, role: &Role, report: &mut ReconcileReport) -> Result<()> {
        let password = password::generate_temp_password(self.password_length)
            .map_err(|e| RoleManagerError::Config(e.to_string()))?;

        self.store
            .create_role(role, &password)
            .await
            .map_err(|source| RoleManagerError::RoleCreation {
                role: role.name.clone(),
                source,
            })?;
        metrics::increment_roles_created();
        info!(role = %role.name, system_role = role.system_role, "Role created");
        report.created_roles.push(role.name.clone());

        if role.system_role {
            report.extend(
                self.credentials
                    .store_managed_secret(&self.stage, &role.name, &password, &self.connection)
                    .await,
            );
        } else {
            report.record(
                self.credentials
                    .store_parameter(&self.stage, &role.name, &password)
                    .await,
            );
        }
        Ok(())
    }
}
