//! # Role Synchronizer
//!
//! Brings one role's group memberships in line with its declaration.
//!
//! Each role gets its own transaction: read current memberships, revoke
//! what is no longer declared, grant what is missing, commit. Any failure
//! rolls the whole role back and is reported, never raised, so one bad
//! role does not stop the rest of the batch.

use super::report::{OperationKind, OperationOutcome};
use crate::database::{MembershipTransaction, RoleStore};
use crate::observability::metrics;
use crate::role::Role;
use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{error, info, info_span, Instrument};

/// Grants and revokes needed to move from the current to the desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// `desired - current`
    pub to_grant: Vec<String>,
    /// `current - desired`
    pub to_revoke: Vec<String>,
}

impl MembershipDiff {
    #[must_use]
    pub fn compute(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_grant: desired.difference(current).cloned().collect(),
            to_revoke: current.difference(desired).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_grant.is_empty() && self.to_revoke.is_empty()
    }
}

/// Sync one role's memberships inside its own transaction
///
/// Never fails: errors roll back the transaction and come back as a
/// failed [`OperationOutcome`].
pub async fn sync_role(store: &dyn RoleStore, role: &Role) -> OperationOutcome {
    let span = info_span!("role.sync", role = %role.name);

    async move {
        let mut tx = match store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                metrics::increment_membership_sync_failures();
                return OperationOutcome::failure(OperationKind::SyncMemberships, &role.name, &e);
            }
        };

        match apply_diff(tx.as_mut(), role).await {
            Ok(diff) => match tx.commit().await {
                Ok(()) => {
                    if !diff.is_empty() {
                        info!(
                            granted = ?diff.to_grant,
                            revoked = ?diff.to_revoke,
                            "Role memberships updated"
                        );
                    }
                    metrics::increment_membership_syncs();
                    OperationOutcome::success(OperationKind::SyncMemberships, &role.name)
                }
                Err(e) => {
                    metrics::increment_membership_sync_failures();
                    OperationOutcome::failure(OperationKind::SyncMemberships, &role.name, &e)
                }
            },
            Err(e) => {
                error!(error = %format!("{e:#}"), "Membership sync failed, rolling back");
                if let Err(rollback_error) = tx.rollback().await {
                    error!(error = %format!("{rollback_error:#}"), "Rollback failed");
                }
                metrics::increment_membership_sync_failures();
                OperationOutcome::failure(OperationKind::SyncMemberships, &role.name, &e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn apply_diff(tx: &mut dyn MembershipTransaction, role: &Role) -> Result<MembershipDiff> {
    let current = tx.current_memberships(&role.name).await?;
    let diff = MembershipDiff::compute(&current, &role.membership_set());

    if !diff.to_revoke.is_empty() {
        info!(roles = ?diff.to_revoke, "Revoking roles");
        tx.revoke(&role.name, &diff.to_revoke).await?;
    }
    if !diff.to_grant.is_empty() {
        info!(roles = ?diff.to_grant, "Granting roles");
        tx.grant(&role.name, &diff.to_grant).await?;
    }

    Ok(diff)
}
