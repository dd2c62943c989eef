//! # Reconcile Report
//!
//! Outcome of every best-effort operation in one invocation.
//!
//! Dropping roles, membership syncs and all credential store calls never
//! abort a reconciliation. Their results are collected here so callers
//! and tests can see partial failures without scraping logs.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::warn;

/// Best-effort operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DropRoles,
    DeleteParameters,
    DeleteSecret,
    StoreParameter,
    StoreSecret,
    ScheduleRotation,
    SyncMemberships,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DropRoles => "drop_roles",
            Self::DeleteParameters => "delete_parameters",
            Self::DeleteSecret => "delete_secret",
            Self::StoreParameter => "store_parameter",
            Self::StoreSecret => "store_secret",
            Self::ScheduleRotation => "schedule_rotation",
            Self::SyncMemberships => "sync_memberships",
        };
        f.write_str(name)
    }
}

/// Result of one best-effort operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    /// Role name, parameter path or secret name the operation acted on
    pub target: String,
    /// Failure reason; `None` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    #[must_use]
    pub fn success(kind: OperationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            error: None,
        }
    }

    /// Record a failure, logging it with the full error chain
    #[must_use]
    pub fn failure(kind: OperationKind, target: impl Into<String>, error: &anyhow::Error) -> Self {
        let target = target.into();
        let reason = format!("{error:#}");
        warn!(operation = %kind, target = %target, error = %reason, "Best-effort operation failed");
        Self {
            kind,
            target,
            error: Some(reason),
        }
    }

    #[must_use]
    pub fn from_result(kind: OperationKind, target: impl Into<String>, result: &anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::success(kind, target),
            Err(e) => Self::failure(kind, target, e),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one lifecycle invocation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Roles created in this invocation, in declaration order
    pub created_roles: Vec<String>,
    /// Roles scheduled for removal in this invocation
    pub deleted_roles: Vec<String>,
    /// Roles whose membership sync committed
    pub synced_roles: Vec<String>,
    pub outcomes: Vec<OperationOutcome>,
}

impl ReconcileReport {
    pub fn record(&mut self, outcome: OperationOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = OperationOutcome>) {
        self.outcomes.extend(outcomes);
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Operations of `kind`, in the order they ran
    pub fn outcomes_of(&self, kind: OperationKind) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(move |o| o.kind == kind)
    }

    /// True when no best-effort operation failed
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Summary attached as `Data` to the custom-resource response
    ///
    /// Only counts; role names stay out of stack outputs.
    #[must_use]
    pub fn response_data(&self) -> Value {
        json!({
            "RolesCreated": self.created_roles.len(),
            "RolesDeleted": self.deleted_roles.len(),
            "RolesSynced": self.synced_roles.len(),
            "FailedOperations": self.failures().count(),
        })
    }
}
