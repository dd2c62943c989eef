//! # Database Role Store
//!
//! The query layer over the PostgreSQL role catalog.
//!
//! [`RoleStore`] covers the catalog reads and the non-transactional DDL
//! (create and drop). Membership changes go through a
//! [`MembershipTransaction`] so each role's GRANT/REVOKE set commits or
//! rolls back as a unit.
//!
//! Implementations return raw errors. Which failures are fatal and which
//! are only reported is decided by the reconciler.

use crate::role::Role;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub mod connection;
pub mod postgres;
pub mod sql;

pub use connection::{CachedConnectionInfo, DbConnectionInfo};
pub use postgres::PgRoleStore;

/// Role catalog access
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Candidates that cannot log in yet, i.e. the roles that must be created
    ///
    /// A candidate is excluded only when a role of that name exists with
    /// `rolcanlogin = true`.
    async fn roles_missing_login(&self, candidates: &[Role]) -> Result<Vec<Role>>;

    /// Names from `names` with no matching role in the catalog
    ///
    /// Checked with a single batched query.
    async fn missing_roles(&self, names: &[String]) -> Result<Vec<String>>;

    /// Create a login role with the given password
    async fn create_role(&self, role: &Role, password: &str) -> Result<()>;

    /// Drop all given roles in one statement; a no-op for an empty list
    async fn drop_roles(&self, roles: &[Role]) -> Result<()>;

    /// Start a transaction for one role's membership changes
    async fn begin(&self) -> Result<Box<dyn MembershipTransaction>>;
}

/// A transaction scoped to a single role's memberships
///
/// Never nested and never shared between roles.
#[async_trait]
pub trait MembershipTransaction: Send {
    /// Group roles `role_name` currently belongs to
    async fn current_memberships(&mut self, role_name: &str) -> Result<BTreeSet<String>>;

    /// `GRANT <groups> TO <role_name>`; only called with a non-empty list
    async fn grant(&mut self, role_name: &str, groups: &[String]) -> Result<()>;

    /// `REVOKE <groups> FROM <role_name>`; only called with a non-empty list
    async fn revoke(&mut self, role_name: &str, groups: &[String]) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
