//! # PostgreSQL Role Store
//!
//! [`RoleStore`] over a `sqlx` connection pool.
//!
//! The pool is built lazily: no connection is opened until the first
//! query, and the handle is meant to be reused for every invocation the
//! process serves.

use super::connection::DbConnectionInfo;
use super::sql;
use super::{MembershipTransaction, RoleStore};
use crate::config::ManagerConfig;
use crate::role::Role;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool, Postgres, Transaction};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Row of the existence check
#[derive(Debug, sqlx::FromRow)]
struct RoleExistsRow {
    role: String,
    found: bool,
}

/// Role store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    /// Build a lazily connecting pool from the admin connection info
    #[must_use]
    pub fn connect_lazy(info: &DbConnectionInfo, config: &ManagerConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&info.host)
            .port(info.port)
            .username(&info.username)
            .password(&info.password)
            .database(&info.dbname)
            .application_name("db-role-manager");

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_connect_timeout())
            .connect_lazy_with(options);

        info!(
            host = %info.host,
            port = info.port,
            dbname = %info.dbname,
            "Database pool configured"
        );
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn roles_missing_login(&self, candidates: &[Role]) -> Result<Vec<Role>> {
        let names: Vec<String> = candidates.iter().map(|r| r.name.clone()).collect();
        let existing: HashSet<String> = sqlx::query_scalar::<_, String>(sql::LOGIN_ROLES_QUERY)
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query login roles")?
            .into_iter()
            .collect();

        Ok(candidates
            .iter()
            .filter(|r| !existing.contains(&r.name))
            .cloned()
            .collect())
    }

    async fn missing_roles(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, RoleExistsRow>(sql::ROLE_EXISTENCE_QUERY)
            .bind(names.to_vec())
            .fetch_all(&self.pool)
            .await
            .context("Failed to check role existence")?;

        Ok(rows
            .into_iter()
            .filter(|row| !row.found)
            .map(|row| row.role)
            .collect())
    }

    async fn create_role(&self, role: &Role, password: &str) -> Result<()> {
        debug!(role = %role.name, "Creating login role");
        let statement = sql::create_role(&role.name, password);
        sqlx::raw_sql(&statement)
            .execute(&self.pool)
            .await
            .with_context(|| format!("CREATE ROLE failed for {}", role.name))?;
        Ok(())
    }

    async fn drop_roles(&self, roles: &[Role]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        sqlx::raw_sql(&sql::drop_roles(&names))
            .execute(&self.pool)
            .await
            .context("DROP ROLE failed")?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn MembershipTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(Box::new(PgMembershipTransaction { tx }))
    }
}

/// One role's membership transaction
pub struct PgMembershipTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgMembershipTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgMembershipTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl MembershipTransaction for PgMembershipTransaction {
    async fn current_memberships(&mut self, role_name: &str) -> Result<BTreeSet<String>> {
        let groups = sqlx::query_scalar::<_, String>(sql::CURRENT_MEMBERSHIPS_QUERY)
            .bind(role_name)
            .fetch_all(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to read memberships of {role_name}"))?;
        Ok(groups.into_iter().collect())
    }

    async fn grant(&mut self, role_name: &str, groups: &[String]) -> Result<()> {
        let statement = sql::grant(groups, role_name);
        (&mut *self.tx)
            .execute(sqlx::raw_sql(&statement))
            .await
            .with_context(|| format!("GRANT to {role_name} failed"))?;
        Ok(())
    }

    async fn revoke(&mut self, role_name: &str, groups: &[String]) -> Result<()> {
        let statement = sql::revoke(groups, role_name);
        (&mut *self.tx)
            .execute(sqlx::raw_sql(&statement))
            .await
            .with_context(|| format!("REVOKE from {role_name} failed"))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back transaction")
    }
}
