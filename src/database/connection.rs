//! # Database Connection Info
//!
//! The RDS admin secret, resolved once per process and cached.
//!
//! The secret is the JSON document RDS generates for the instance's master
//! credentials. Besides connecting, its non-credential fields are merged
//! into every system-role secret so the rotation function can reach the
//! database.

use crate::provider::SecretManagerProvider;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Connection details from the RDS admin secret
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct DbConnectionInfo {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(deserialize_with = "port_number_or_string")]
    pub port: u16,
    pub dbname: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub db_instance_identifier: Option<String>,
}

impl std::fmt::Debug for DbConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnectionInfo")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("engine", &self.engine)
            .field("db_instance_identifier", &self.db_instance_identifier)
            .finish_non_exhaustive()
    }
}

impl DbConnectionInfo {
    /// Parse the secret string stored by RDS
    ///
    /// # Errors
    ///
    /// Fails when the JSON is malformed or a required field is missing.
    pub fn from_secret_string(secret: &str) -> Result<Self> {
        serde_json::from_str(secret).context("Database secret is not valid RDS connection JSON")
    }

    /// Everything except the credentials, keyed as RDS keys it
    #[must_use]
    pub fn connection_metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("dbname".to_string(), Value::from(self.dbname.clone()));
        map.insert("engine".to_string(), Value::from(self.engine.clone()));
        map.insert("port".to_string(), Value::from(self.port));
        map.insert(
            "dbInstanceIdentifier".to_string(),
            self.db_instance_identifier
                .clone()
                .map_or(Value::Null, Value::from),
        );
        map.insert("host".to_string(), Value::from(self.host.clone()));
        map
    }
}

fn default_engine() -> String {
    "postgres".to_string()
}

/// Secrets Manager keeps `port` as a number, hand-written secrets often as a string
fn port_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        String(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(p) => Ok(p),
        Port::String(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid port {s:?}: {e}"))),
    }
}

/// Admin connection info fetched from Secrets Manager on first use
///
/// Never refetched for the lifetime of the handle.
pub struct CachedConnectionInfo {
    secrets: Arc<dyn SecretManagerProvider>,
    secret_id: String,
    cell: OnceCell<DbConnectionInfo>,
}

impl std::fmt::Debug for CachedConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedConnectionInfo")
            .field("secret_id", &self.secret_id)
            .field("resolved", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

impl CachedConnectionInfo {
    pub fn new(secrets: Arc<dyn SecretManagerProvider>, secret_id: impl Into<String>) -> Self {
        Self {
            secrets,
            secret_id: secret_id.into(),
            cell: OnceCell::new(),
        }
    }

    /// Resolve the connection info, fetching the secret on the first call only
    ///
    /// # Errors
    ///
    /// Fails when the secret cannot be read, does not exist, or is malformed.
    /// A failed fetch is not cached; the next call tries again.
    pub async fn get(&self) -> Result<&DbConnectionInfo> {
        self.cell
            .get_or_try_init(|| async {
                info!(secret_id = %self.secret_id, "Resolving database connection secret");
                let value = self
                    .secrets
                    .get_secret_value(&self.secret_id)
                    .await
                    .with_context(|| format!("Failed to read database secret {}", self.secret_id))?
                    .with_context(|| format!("Database secret {} does not exist", self.secret_id))?;
                DbConnectionInfo::from_secret_string(&value)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RDS_SECRET: &str = r#"{
        "username": "demos_admin",
        "password": "hunter2",
        "engine": "postgres",
        "host": "demos-dev-rds.abc.us-east-1.rds.amazonaws.com",
        "port": 15432,
        "dbname": "demos",
        "dbInstanceIdentifier": "demos-dev-rds"
    }"#;

    #[test]
    fn test_parse_rds_secret() {
        let info = DbConnectionInfo::from_secret_string(RDS_SECRET).unwrap();
        assert_eq!(info.username, "demos_admin");
        assert_eq!(info.port, 15432);
        assert_eq!(info.db_instance_identifier.as_deref(), Some("demos-dev-rds"));
    }

    #[test]
    fn test_port_as_string() {
        let info = DbConnectionInfo::from_secret_string(
            r#"{"username":"u","password":"p","host":"h","port":"5432","dbname":"d"}"#,
        )
        .unwrap();
        assert_eq!(info.port, 5432);
        assert_eq!(info.engine, "postgres");
    }

    #[test]
    fn test_connection_metadata_excludes_credentials() {
        let info = DbConnectionInfo::from_secret_string(RDS_SECRET).unwrap();
        let metadata = info.connection_metadata();
        assert!(!metadata.contains_key("password"));
        assert!(!metadata.contains_key("username"));
        assert_eq!(metadata["port"], 15432);
        assert_eq!(metadata["dbInstanceIdentifier"], "demos-dev-rds");
    }

    #[test]
    fn test_debug_redacts_password() {
        let info = DbConnectionInfo::from_secret_string(RDS_SECRET).unwrap();
        assert!(!format!("{info:?}").contains("hunter2"));
    }
}
