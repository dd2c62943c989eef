//! Database Role Manager Library
//!
//! Reconciles PostgreSQL login roles, their group memberships and their
//! stored credentials against a declared role set. Driven by CloudFormation
//! custom-resource events through [`handler`].

pub mod config;
pub mod constants;
pub mod credentials;
pub mod database;
pub mod error;
pub mod handler;
pub mod observability;
pub mod password;
pub mod provider;
pub mod reconciler;
pub mod role;
pub mod runtime;
pub mod validation;

pub use config::ManagerConfig;
pub use error::{RoleManagerError, ValidationError};
pub use reconciler::{ReconcileReport, RoleReconciler};
pub use role::Role;
pub use runtime::HandlerRuntime;
