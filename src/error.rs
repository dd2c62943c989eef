//! # Errors
//!
//! Fatal errors of a reconciliation. Anything that is not in here is
//! best-effort and ends up in the [`ReconcileReport`](crate::reconciler::ReconcileReport)
//! instead of aborting the invocation.

use std::fmt;
use thiserror::Error;

/// Every reason a declared role set was rejected
///
/// All offending names are collected before the error is raised, so one
/// failed deployment shows every problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Declared role names that fail the identifier pattern
    pub invalid_role_names: Vec<String>,
    /// Membership names that fail the identifier pattern
    pub invalid_member_names: Vec<String>,
    /// Role names declared more than once
    pub duplicate_role_names: Vec<String>,
    /// Roles that list themselves as a membership
    pub self_referencing_roles: Vec<String>,
    /// Membership names with no matching role in the database catalog
    pub missing_member_roles: Vec<String>,
}

impl ValidationError {
    /// True when no problem has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invalid_role_names.is_empty()
            && self.invalid_member_names.is_empty()
            && self.duplicate_role_names.is_empty()
            && self.self_referencing_roles.is_empty()
            && self.missing_member_roles.is_empty()
    }

    /// `Err(self)` if anything was recorded
    ///
    /// # Errors
    ///
    /// Returns the collected error when at least one problem was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("invalid member role names", &self.invalid_member_names),
            ("invalid role names", &self.invalid_role_names),
            ("duplicate role names", &self.duplicate_role_names),
            ("roles listing themselves as a membership", &self.self_referencing_roles),
            ("at least one role does not exist", &self.missing_member_roles),
        ];
        let parts: Vec<String> = sections
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(label, names)| format!("{label}: {}", names.join(", ")))
            .collect();
        if parts.is_empty() {
            write!(f, "role validation failed")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors that fail the whole custom-resource operation
#[derive(Debug, Error)]
pub enum RoleManagerError {
    /// The declared roles are not syntactically or referentially valid
    #[error("role validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A role that should exist could not be created
    #[error("failed to create role: {role}")]
    RoleCreation {
        role: String,
        #[source]
        source: anyhow::Error,
    },

    /// The custom-resource event carried an unknown `RequestType`
    #[error("invalid request type: {0}")]
    InvalidRequestType(String),

    /// Create/Update events must carry a `roles` array
    #[error("the array of roles must be defined")]
    MissingRoles,

    /// A catalog read needed before any mutation failed
    #[error("database error: {0}")]
    Database(#[source] anyhow::Error),

    /// The handler could not be configured or connected
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = RoleManagerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_name() {
        let err = ValidationError {
            invalid_role_names: vec!["Bad-Name".to_string(), "UPPER".to_string()],
            missing_member_roles: vec!["ghost".to_string()],
            ..ValidationError::default()
        };
        let message = err.to_string();
        assert!(message.contains("invalid role names: Bad-Name, UPPER"), "{message}");
        assert!(message.contains("at least one role does not exist: ghost"), "{message}");
        assert!(!message.contains("duplicate"), "{message}");
    }

    #[test]
    fn test_empty_validation_error_is_ok() {
        assert!(ValidationError::default().into_result().is_ok());
    }

    #[test]
    fn test_request_errors_display() {
        assert_eq!(
            RoleManagerError::InvalidRequestType("invalid".to_string()).to_string(),
            "invalid request type: invalid"
        );
        assert_eq!(
            RoleManagerError::MissingRoles.to_string(),
            "the array of roles must be defined"
        );
    }

    #[test]
    fn test_role_creation_error_names_role() {
        let err = RoleManagerError::RoleCreation {
            role: "reporting".to_string(),
            source: anyhow::anyhow!("permission denied"),
        };
        assert_eq!(err.to_string(), "failed to create role: reporting");
    }
}
