//! # Database Role Manager
//!
//! CloudFormation custom-resource handler for PostgreSQL roles.
//!
//! ## Usage
//!
//! ```bash
//! # Handle an event read from stdin and print the response
//! db-role-manager handle < event.json
//!
//! # Handle an event file and PUT the response to its ResponseURL
//! db-role-manager handle --event event.json --respond
//!
//! # Serve newline-delimited events from stdin until it closes
//! db-role-manager serve --respond
//!
//! # Check a role declaration offline
//! db-role-manager validate --roles roles.json
//!
//! # Print a temporary password
//! db-role-manager generate-password --length 24
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db_role_manager::config::ManagerConfig;
use db_role_manager::credentials::CredentialStore;
use db_role_manager::database::CachedConnectionInfo;
use db_role_manager::handler::{CustomResourceRequest, ResponseSender};
use db_role_manager::observability::{logging, metrics};
use db_role_manager::provider::aws::{self, AwsCallerIdentity, AwsParameterStore, AwsSecretManager};
use db_role_manager::provider::SecretManagerProvider;
use db_role_manager::role::Role;
use db_role_manager::runtime::{self, HandlerRuntime};
use db_role_manager::{password, validation, RoleManagerError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, warn};

/// Database role and credential reconciliation
#[derive(Parser)]
#[command(name = "db-role-manager", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one custom-resource event and print the response
    Handle {
        /// Event file; `-` or omitted reads stdin
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,

        /// Also PUT the response to the event's ResponseURL
        #[arg(long)]
        respond: bool,
    },
    /// Handle newline-delimited events from stdin, one response line each
    ///
    /// The database pool and the admin credentials are shared by every event.
    Serve {
        /// Also PUT each response to its event's ResponseURL
        #[arg(long)]
        respond: bool,
    },
    /// Check a JSON array of roles without touching the database
    Validate {
        #[arg(long, value_name = "FILE")]
        roles: PathBuf,
    },
    /// Print a temporary password
    GeneratePassword {
        #[arg(long, default_value_t = db_role_manager::constants::DEFAULT_PASSWORD_LENGTH)]
        length: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|existing| anyhow::anyhow!("rustls crypto provider already installed: {existing:?}"))?;

    let cli = Cli::parse();
    let config = ManagerConfig::from_env();
    logging::init_tracing(&config);

    debug!(
        git_hash = env!("BUILD_GIT_HASH"),
        built_at = env!("BUILD_DATETIME"),
        "db-role-manager starting"
    );

    match cli.command {
        Commands::Handle { event, respond } => handle_command(config, event.as_deref(), respond).await,
        Commands::Serve { respond } => serve_command(config, respond).await,
        Commands::Validate { roles } => validate_command(&roles),
        Commands::GeneratePassword { length } => {
            let password = password::generate_temp_password(length)?;
            println!("{}", password.as_str());
            Ok(())
        }
    }
}

async fn handle_command(config: ManagerConfig, event: Option<&Path>, respond: bool) -> Result<()> {
    metrics::register_metrics()?;

    let raw = read_input(event)?;
    let request: CustomResourceRequest =
        serde_json::from_str(&raw).context("Event is not a valid custom resource request")?;

    let runtime = build_runtime(config).await;
    let response = runtime.handle(&request).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );

    if respond {
        runtime::deliver(&ResponseSender::new()?, &request, &response).await?;
    }

    if let Ok(text) = metrics::gather_metrics() {
        debug!(metrics = %text, "Invocation metrics");
    }

    if response.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "custom resource request failed: {}",
            response.reason.as_deref().unwrap_or("unknown error")
        ))
    }
}

async fn serve_command(config: ManagerConfig, respond: bool) -> Result<()> {
    metrics::register_metrics()?;

    let runtime = build_runtime(config).await;
    let sender = if respond { Some(ResponseSender::new()?) } else { None };
    let mut stdout = tokio::io::stdout();
    let summary = runtime
        .serve(BufReader::new(tokio::io::stdin()), &mut stdout, sender.as_ref())
        .await?;

    if let Ok(text) = metrics::gather_metrics() {
        debug!(metrics = %text, "Invocation metrics");
    }
    info!(handled = summary.handled, failed = summary.failed, "Serve finished");
    Ok(())
}

/// AWS clients, account id, credential stores and the connection cache
///
/// Nothing here touches the database; the pool is built on the first event.
async fn build_runtime(config: ManagerConfig) -> HandlerRuntime {
    let sdk_config = aws::load_sdk_config(&config.region).await;
    let config = runtime::resolve_account_id(config, &AwsCallerIdentity::new(&sdk_config)).await;

    let secrets: Arc<dyn SecretManagerProvider> = Arc::new(AwsSecretManager::new(&sdk_config));
    let parameters = Arc::new(AwsParameterStore::new(&sdk_config));

    let rotation_function_arn = config.rotation_function_arn();
    if rotation_function_arn.is_none() {
        warn!("No rotation function configured; system role secrets will not rotate");
    }
    let credentials = CredentialStore::new(
        config.app_name.clone(),
        parameters,
        Arc::clone(&secrets),
        rotation_function_arn,
        config.rotation_days,
    );
    let connection = CachedConnectionInfo::new(secrets, config.database_secret_id.clone());

    HandlerRuntime::postgres(config, connection, credentials)
}

fn validate_command(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let roles: Vec<Role> = serde_json::from_str(&raw).context("Roles file must be a JSON array of roles")?;

    validation::check_syntax(&roles)
        .into_result()
        .map_err(RoleManagerError::from)?;
    println!("{} role(s) OK", roles.len());
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            Ok(buf)
        }
    }
}
