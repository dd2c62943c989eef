//! # Configuration
//!
//! Settings for the role manager, loaded from environment variables.
//!
//! - `manager`: invocation-level settings (stage, app name, credential store
//!   naming, rotation, database pool sizing, logging)

pub mod manager;

pub use manager::ManagerConfig;
