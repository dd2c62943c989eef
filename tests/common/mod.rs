//! Common test utilities for reconciliation tests
//!
//! In-memory stand-ins for the PostgreSQL role catalog and both AWS
//! credential stores, each with failure injection. The catalog records
//! every statement it would have run, rendered with the real SQL builders.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use db_role_manager::credentials::CredentialStore;
use db_role_manager::database::{sql, DbConnectionInfo, MembershipTransaction, RoleStore};
use db_role_manager::provider::{ParameterStoreProvider, SecretManagerProvider};
use db_role_manager::role::Role;
use db_role_manager::RoleReconciler;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const STAGE: &str = "dev";
pub const ROTATION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:demos-dev-rds-rotation";

pub const ADMIN_SECRET: &str = r#"{
    "username": "demos_admin",
    "password": "admin-password",
    "engine": "postgres",
    "host": "demos-dev-rds.cluster.us-east-1.rds.amazonaws.com",
    "port": 5432,
    "dbname": "demos",
    "dbInstanceIdentifier": "demos-dev-rds"
}"#;

/// Statement that should fail when the catalog reaches it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fail {
    CreateRole(String),
    Grant(String),
    Revoke(String),
    DropRoles,
    Begin,
    LoginLookup,
    ExistenceCheck,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogRole {
    pub can_login: bool,
    pub member_of: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CatalogState {
    roles: BTreeMap<String, CatalogRole>,
    passwords: BTreeMap<String, String>,
    statements: Vec<String>,
    failures: HashSet<Fail>,
}

/// In-memory role catalog
#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group role (cannot log in)
    pub fn with_group(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert(name.to_string(), CatalogRole::default());
        self
    }

    /// Add a login role that already belongs to `member_of`
    pub fn with_login_role(self, name: &str, member_of: &[&str]) -> Self {
        self.state.lock().unwrap().roles.insert(
            name.to_string(),
            CatalogRole {
                can_login: true,
                member_of: member_of.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    pub fn fail_on(&self, fail: Fail) {
        self.state.lock().unwrap().failures.insert(fail);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn role(&self, name: &str) -> Option<CatalogRole> {
        self.state.lock().unwrap().roles.get(name).cloned()
    }

    pub fn memberships(&self, name: &str) -> BTreeSet<String> {
        self.role(name).map(|r| r.member_of).unwrap_or_default()
    }

    pub fn password(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().passwords.get(name).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.state.lock().unwrap().statements.clear();
    }

    /// Statements starting with `prefix`
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl RoleStore for FakeCatalog {
    async fn roles_missing_login(&self, candidates: &[Role]) -> Result<Vec<Role>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push("SELECT login roles".to_string());
        if state.failures.contains(&Fail::LoginLookup) {
            return Err(anyhow!("injected login lookup failure"));
        }
        Ok(candidates
            .iter()
            .filter(|r| !state.roles.get(&r.name).is_some_and(|c| c.can_login))
            .cloned()
            .collect())
    }

    async fn missing_roles(&self, names: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push("SELECT role existence".to_string());
        if state.failures.contains(&Fail::ExistenceCheck) {
            return Err(anyhow!("injected existence check failure"));
        }
        Ok(names
            .iter()
            .filter(|n| !state.roles.contains_key(*n))
            .cloned()
            .collect())
    }

    async fn create_role(&self, role: &Role, password: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql::create_role(&role.name, "<redacted>"));
        if state.failures.contains(&Fail::CreateRole(role.name.clone())) {
            return Err(anyhow!("injected CREATE ROLE failure"));
        }
        if state.roles.contains_key(&role.name) {
            return Err(anyhow!("role \"{}\" already exists", role.name));
        }
        state.roles.insert(
            role.name.clone(),
            CatalogRole {
                can_login: true,
                member_of: BTreeSet::new(),
            },
        );
        state.passwords.insert(role.name.clone(), password.to_string());
        Ok(())
    }

    async fn drop_roles(&self, roles: &[Role]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        state.statements.push(sql::drop_roles(&names));
        if state.failures.contains(&Fail::DropRoles) {
            return Err(anyhow!("role \"{}\" cannot be dropped because some objects depend on it", names[0]));
        }
        for name in &names {
            state.roles.remove(*name);
            state.passwords.remove(*name);
        }
        for role in state.roles.values_mut() {
            role.member_of.retain(|g| !names.contains(&g.as_str()));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn MembershipTransaction>> {
        let mut state = self.state.lock().unwrap();
        if state.failures.contains(&Fail::Begin) {
            return Err(anyhow!("injected BEGIN failure"));
        }
        state.statements.push("BEGIN".to_string());
        Ok(Box::new(FakeTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        }))
    }
}

enum Change {
    Grant(String, Vec<String>),
    Revoke(String, Vec<String>),
}

/// Stages membership changes until commit
pub struct FakeTransaction {
    state: Arc<Mutex<CatalogState>>,
    staged: Vec<Change>,
}

#[async_trait]
impl MembershipTransaction for FakeTransaction {
    async fn current_memberships(&mut self, role_name: &str) -> Result<BTreeSet<String>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(format!("SELECT memberships of {role_name}"));
        Ok(state
            .roles
            .get(role_name)
            .map(|r| r.member_of.clone())
            .unwrap_or_default())
    }

    async fn grant(&mut self, role_name: &str, groups: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql::grant(groups, role_name));
        if state.failures.contains(&Fail::Grant(role_name.to_string())) {
            return Err(anyhow!("injected GRANT failure"));
        }
        self.staged.push(Change::Grant(role_name.to_string(), groups.to_vec()));
        Ok(())
    }

    async fn revoke(&mut self, role_name: &str, groups: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql::revoke(groups, role_name));
        if state.failures.contains(&Fail::Revoke(role_name.to_string())) {
            return Err(anyhow!("injected REVOKE failure"));
        }
        self.staged.push(Change::Revoke(role_name.to_string(), groups.to_vec()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { state, staged } = *self;
        let mut state = state.lock().unwrap();
        state.statements.push("COMMIT".to_string());
        for change in staged {
            match change {
                Change::Grant(role, groups) => {
                    let entry = state.roles.entry(role).or_default();
                    entry.member_of.extend(groups);
                }
                Change::Revoke(role, groups) => {
                    if let Some(entry) = state.roles.get_mut(&role) {
                        entry.member_of.retain(|g| !groups.contains(g));
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().statements.push("ROLLBACK".to_string());
        Ok(())
    }
}

/// In-memory SSM Parameter Store
#[derive(Debug, Default)]
pub struct FakeParameterStore {
    pub parameters: Mutex<BTreeMap<String, String>>,
    pub delete_batches: Mutex<Vec<Vec<String>>>,
    pub fail_put: Mutex<HashSet<String>>,
    pub fail_delete: Mutex<bool>,
}

impl FakeParameterStore {
    pub fn get(&self, name: &str) -> Option<String> {
        self.parameters.lock().unwrap().get(name).cloned()
    }

    pub fn insert(&self, name: &str, value: &str) {
        self.parameters
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ParameterStoreProvider for FakeParameterStore {
    async fn put_secure_string(&self, name: &str, value: &str) -> Result<()> {
        if self.fail_put.lock().unwrap().contains(name) {
            return Err(anyhow!("AccessDeniedException: ssm:PutParameter"));
        }
        self.insert(name, value);
        Ok(())
    }

    async fn delete_parameters(&self, names: &[String]) -> Result<Vec<String>> {
        self.delete_batches.lock().unwrap().push(names.to_vec());
        if *self.fail_delete.lock().unwrap() {
            return Err(anyhow!("AccessDeniedException: ssm:DeleteParameters"));
        }
        let mut parameters = self.parameters.lock().unwrap();
        Ok(names
            .iter()
            .filter(|n| parameters.remove(*n).is_none())
            .cloned()
            .collect())
    }
}

/// In-memory Secrets Manager
#[derive(Debug, Default)]
pub struct FakeSecretStore {
    pub secrets: Mutex<BTreeMap<String, String>>,
    pub rotations: Mutex<Vec<(String, String, i64)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_create: Mutex<HashSet<String>>,
    pub fail_rotation: Mutex<HashSet<String>>,
    pub fail_delete: Mutex<HashSet<String>>,
    pub get_calls: AtomicUsize,
}

impl FakeSecretStore {
    pub fn get(&self, name: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn insert(&self, name: &str, value: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretManagerProvider for FakeSecretStore {
    async fn create_secret(&self, secret_name: &str, secret_value: &str) -> Result<()> {
        if self.fail_create.lock().unwrap().contains(secret_name) {
            return Err(anyhow!("ResourceExistsException: {secret_name}"));
        }
        self.insert(secret_name, secret_value);
        Ok(())
    }

    async fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(secret_id))
    }

    async fn schedule_rotation(
        &self,
        secret_name: &str,
        rotation_function_arn: &str,
        rotate_after_days: i64,
    ) -> Result<()> {
        if self.fail_rotation.lock().unwrap().contains(secret_name) {
            return Err(anyhow!("AccessDeniedException: lambda:InvokeFunction"));
        }
        self.rotations.lock().unwrap().push((
            secret_name.to_string(),
            rotation_function_arn.to_string(),
            rotate_after_days,
        ));
        Ok(())
    }

    async fn delete_secret(&self, secret_name: &str) -> Result<()> {
        if self.fail_delete.lock().unwrap().contains(secret_name) {
            return Err(anyhow!("InvalidRequestException: {secret_name}"));
        }
        self.deleted.lock().unwrap().push(secret_name.to_string());
        self.secrets.lock().unwrap().remove(secret_name);
        Ok(())
    }
}

/// A reconciler wired to fakes
pub struct Harness {
    pub catalog: FakeCatalog,
    pub parameters: Arc<FakeParameterStore>,
    pub secrets: Arc<FakeSecretStore>,
    pub reconciler: RoleReconciler,
}

impl Harness {
    pub fn new(catalog: FakeCatalog) -> Self {
        let parameters = Arc::new(FakeParameterStore::default());
        let secrets = Arc::new(FakeSecretStore::default());
        let credentials = CredentialStore::new(
            "demos",
            Arc::clone(&parameters) as Arc<dyn ParameterStoreProvider>,
            Arc::clone(&secrets) as Arc<dyn SecretManagerProvider>,
            Some(ROTATION_ARN.to_string()),
            30,
        );
        let connection = DbConnectionInfo::from_secret_string(ADMIN_SECRET).unwrap();
        let reconciler = RoleReconciler::new(
            Arc::new(catalog.clone()),
            credentials,
            Arc::new(connection),
            STAGE,
            20,
        );
        Self {
            catalog,
            parameters,
            secrets,
            reconciler,
        }
    }

    /// Catalog with the usual group roles
    pub fn with_groups() -> Self {
        Self::new(
            FakeCatalog::new()
                .with_group("demos_read")
                .with_group("demos_write")
                .with_group("demos_delete"),
        )
    }
}

pub fn parameter_path(role: &str) -> String {
    format!("/demos/{STAGE}/db-temp-password/{role}")
}

pub fn secret_name(role: &str) -> String {
    format!("demos-{STAGE}-rds-{role}")
}

pub fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}
