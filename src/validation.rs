//! # Role Validation
//!
//! Checks a declared role set before anything is created or dropped.
//!
//! Syntax is checked first and entirely in memory: names must match
//! `^[a-z_]+$`, declared names must be unique and no role may list itself.
//! Only a syntactically clean set is sent to the database, where every
//! membership must already exist in the role catalog.
//!
//! Role names end up spliced into DDL, so nothing may reach the
//! [`RoleStore`] write path without passing through here.

use crate::database::RoleStore;
use crate::error::{RoleManagerError, ValidationError};
use crate::role::Role;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

static ROLE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_]+$").expect("Failed to compile role name pattern - this should never happen")
});

/// Lowercase letters and underscores only
#[must_use]
pub fn is_valid_role_name(name: &str) -> bool {
    ROLE_NAME_PATTERN.is_match(name)
}

/// True when any name occurs more than once
#[must_use]
pub fn has_duplicates<S: AsRef<str>>(names: &[S]) -> bool {
    let unique: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
    unique.len() != names.len()
}

/// Every distinct membership name across all roles, sorted
#[must_use]
pub fn membership_universe(roles: &[Role]) -> Vec<String> {
    roles
        .iter()
        .flat_map(|r| r.memberships.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// In-memory checks; never touches the database
#[must_use]
pub fn check_syntax(roles: &[Role]) -> ValidationError {
    let mut errors = ValidationError::default();

    errors.invalid_member_names = membership_universe(roles)
        .into_iter()
        .filter(|name| !is_valid_role_name(name))
        .collect();

    errors.invalid_role_names = roles
        .iter()
        .filter(|r| !is_valid_role_name(&r.name))
        .map(|r| r.name.clone())
        .collect();

    let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
    if has_duplicates(&names) {
        let mut seen = HashSet::new();
        let duplicates: BTreeSet<&str> = names
            .iter()
            .copied()
            .filter(|n| !seen.insert(*n))
            .collect();
        errors.duplicate_role_names = duplicates.into_iter().map(ToString::to_string).collect();
    }

    errors.self_referencing_roles = roles
        .iter()
        .filter(|r| r.memberships.iter().any(|m| m == &r.name))
        .map(|r| r.name.clone())
        .collect();

    errors
}

/// Validate a declared role set against the syntax rules and the catalog
///
/// # Errors
///
/// [`RoleManagerError::Validation`] listing every offending name, or
/// [`RoleManagerError::Database`] when the existence check cannot run.
pub async fn validate_roles(store: &dyn RoleStore, roles: &[Role]) -> Result<(), RoleManagerError> {
    let errors = check_syntax(roles);
    if !errors.is_empty() {
        warn!(error = %errors, "Declared roles failed syntax validation");
        return Err(errors.into());
    }

    let memberships = membership_universe(roles);
    debug!(memberships = ?memberships, "Checking that member roles exist");
    let missing = store
        .missing_roles(&memberships)
        .await
        .map_err(RoleManagerError::Database)?;

    if !missing.is_empty() {
        let errors = ValidationError {
            missing_member_roles: missing,
            ..ValidationError::default()
        };
        warn!(error = %errors, "Declared memberships reference unknown roles");
        return Err(errors.into());
    }

    Ok(())
}
