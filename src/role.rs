//! # Roles
//!
//! The declared role entity and the helpers that compare two declarations.
//!
//! A [`Role`] is what the stack author writes in the custom resource's
//! `roles` property. The database is always re-read for the observed side;
//! nothing here is persisted.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// A declared database login role
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Role name; must match `^[a-z_]+$`
    pub name: String,
    /// Group roles this role should be a member of, in declaration order
    #[serde(default)]
    pub memberships: Vec<String>,
    /// System roles keep their credential in Secrets Manager with rotation
    /// instead of a SecureString parameter
    #[serde(default, deserialize_with = "bool_or_string")]
    pub system_role: bool,
}

impl Role {
    /// Plain login role with the given memberships
    pub fn new<I, S>(name: impl Into<String>, memberships: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            memberships: memberships.into_iter().map(Into::into).collect(),
            system_role: false,
        }
    }

    /// Mark the role as a system role
    #[must_use]
    pub fn system(mut self) -> Self {
        self.system_role = true;
        self
    }

    /// Desired memberships as a set
    #[must_use]
    pub fn membership_set(&self) -> BTreeSet<String> {
        self.memberships.iter().cloned().collect()
    }
}

/// Roles present in `previous` whose name no longer appears in `desired`
///
/// Comparison is by name only: a role kept in both lists with different
/// memberships or a different `system_role` flag is not deleted.
#[must_use]
pub fn find_deleted_roles(desired: &[Role], previous: &[Role]) -> Vec<Role> {
    previous
        .iter()
        .filter(|old| !desired.iter().any(|r| r.name == old.name))
        .cloned()
        .collect()
}

/// Roles kept by name whose `system_role` flag flipped between declarations
///
/// Their credential is not migrated between stores; callers log these.
#[must_use]
pub fn find_system_role_changes<'a>(desired: &'a [Role], previous: &[Role]) -> Vec<&'a Role> {
    desired
        .iter()
        .filter(|role| {
            previous
                .iter()
                .any(|old| old.name == role.name && old.system_role != role.system_role)
        })
        .collect()
}

/// Split roles into (plain, system) by their `system_role` flag
#[must_use]
pub fn partition_by_system_role(roles: &[Role]) -> (Vec<&Role>, Vec<&Role>) {
    roles.iter().partition(|r| !r.system_role)
}

/// CloudFormation passes every scalar resource property as a string,
/// so accept both `true` and `"true"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid systemRole value: {other}"
            ))),
        },
    }
}
