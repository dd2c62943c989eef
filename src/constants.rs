//! # Constants
//!
//! Shared constants used throughout the role manager.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config`]).

/// Default application name used in credential paths and secret names
pub const DEFAULT_APP_NAME: &str = "demos";

/// Default stage (environment) name
pub const DEFAULT_STAGE: &str = "dev";

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default length of generated temporary passwords
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Smallest password that still has room for every required character class
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Automatic rotation interval for system-role secrets (days)
pub const DEFAULT_ROTATION_DAYS: i64 = 30;

/// Maximum pooled connections to the database
/// Roles are processed sequentially, so a small pool is enough
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 2;

/// Timeout for acquiring a database connection (seconds)
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Path segment under which temporary role passwords are stored in Parameter Store
pub const TEMP_PASSWORD_PATH_SEGMENT: &str = "db-temp-password";

/// Segment used in managed secret names: `{app}-{env}-rds-{role}`
pub const RDS_SECRET_SEGMENT: &str = "rds";

/// Prefix of the physical resource id reported for a newly created resource
pub const PHYSICAL_RESOURCE_ID_PREFIX: &str = "db-roles";

/// Maximum number of names accepted by a single SSM `DeleteParameters` call
pub const SSM_DELETE_PARAMETERS_BATCH: usize = 10;
