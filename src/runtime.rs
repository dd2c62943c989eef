//! # Runtime
//!
//! Process-level state shared by every event a process handles.
//!
//! The admin connection secret, the pool built from it and the reconciler
//! are created on the first event and reused for the rest of the process.
//! A failed build is not kept; the next event tries again.
//!
//! [`HandlerRuntime::serve`] reads newline-delimited events and writes one
//! response line per event, so a single process can serve many invocations.

use crate::config::ManagerConfig;
use crate::credentials::CredentialStore;
use crate::database::{CachedConnectionInfo, DbConnectionInfo, PgRoleStore, RoleStore};
use crate::error::RoleManagerError;
use crate::handler::{self, CustomResourceRequest, CustomResourceResponse, ResponseSender};
use crate::observability::metrics;
use crate::provider::AccountIdentityProvider;
use crate::reconciler::RoleReconciler;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Builds the role store once the admin connection info is known
pub type StoreConnector =
    Box<dyn Fn(&DbConnectionInfo, &ManagerConfig) -> Arc<dyn RoleStore> + Send + Sync>;

/// Fill in `account_id` from the caller identity when nothing configures it
///
/// Skipped when an account id or an explicit rotation function ARN is set.
/// A failed lookup is logged and leaves the config unchanged.
pub async fn resolve_account_id(
    mut config: ManagerConfig,
    identity: &dyn AccountIdentityProvider,
) -> ManagerConfig {
    if config.account_id.is_some() || config.rotation_function_arn.is_some() {
        return config;
    }
    match identity.account_id().await {
        Ok(account) => {
            info!(account_id = %account, "Resolved AWS account id from caller identity");
            config.account_id = Some(account);
        }
        Err(e) => warn!(
            error = %format!("{e:#}"),
            "Could not resolve AWS account id; system role secrets will not rotate"
        ),
    }
    config
}

/// Counts from one [`HandlerRuntime::serve`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub handled: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Long-lived handler state: connection cache, credential stores, reconciler
pub struct HandlerRuntime {
    config: ManagerConfig,
    connection: CachedConnectionInfo,
    credentials: CredentialStore,
    connect: StoreConnector,
    reconciler: OnceCell<RoleReconciler>,
}

impl std::fmt::Debug for HandlerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRuntime")
            .field("stage", &self.config.stage)
            .field("connection", &self.connection)
            .field("reconciler_ready", &self.reconciler.initialized())
            .finish_non_exhaustive()
    }
}

impl HandlerRuntime {
    pub fn new(
        config: ManagerConfig,
        connection: CachedConnectionInfo,
        credentials: CredentialStore,
        connect: StoreConnector,
    ) -> Self {
        Self {
            config,
            connection,
            credentials,
            connect,
            reconciler: OnceCell::new(),
        }
    }

    /// Runtime backed by a lazily connected PostgreSQL pool
    pub fn postgres(
        config: ManagerConfig,
        connection: CachedConnectionInfo,
        credentials: CredentialStore,
    ) -> Self {
        Self::new(config, connection, credentials, Box::new(connect_postgres))
    }

    /// The reconciler, built on first use
    ///
    /// # Errors
    ///
    /// [`RoleManagerError::Config`] when the admin connection secret cannot
    /// be resolved.
    pub async fn reconciler(&self) -> Result<&RoleReconciler, RoleManagerError> {
        self.reconciler
            .get_or_try_init(|| async {
                let info = self
                    .connection
                    .get()
                    .await
                    .map_err(|e| RoleManagerError::Config(format!("{e:#}")))?;
                let store = (self.connect)(info, &self.config);
                info!("Role reconciler ready");
                Ok::<_, RoleManagerError>(RoleReconciler::new(
                    store,
                    self.credentials.clone(),
                    Arc::new(info.clone()),
                    self.config.stage.clone(),
                    self.config.password_length,
                ))
            })
            .await
    }

    /// Handle one event; never fails
    pub async fn handle(&self, request: &CustomResourceRequest) -> CustomResourceResponse {
        match self.reconciler().await {
            Ok(reconciler) => handler::handle_event(reconciler, request).await,
            Err(e) => {
                error!(error = %e, "Failed to initialise role reconciler");
                metrics::increment_invocations(&request.request_type);
                metrics::increment_invocation_errors();
                handler::failure_response(request, &e)
            }
        }
    }

    /// Handle newline-delimited events from `input` until it ends
    ///
    /// Each response is written to `output` as one JSON line. With a
    /// `sender`, it is also PUT to the event's `ResponseURL`; delivery
    /// failures are logged and do not stop the loop. Blank lines are
    /// ignored and malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Fails only when reading `input` or writing `output` fails.
    pub async fn serve<R, W>(
        &self,
        input: R,
        output: &mut W,
        sender: Option<&ResponseSender>,
    ) -> Result<ServeSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = ServeSummary::default();
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read event")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let request: CustomResourceRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Skipping malformed custom resource event");
                    summary.malformed += 1;
                    continue;
                }
            };

            let response = self.handle(&request).await;
            summary.handled += 1;
            if !response.is_success() {
                summary.failed += 1;
            }

            let mut encoded = serde_json::to_vec(&response).context("Failed to serialize response")?;
            encoded.push(b'\n');
            output.write_all(&encoded).await.context("Failed to write response")?;
            output.flush().await.context("Failed to write response")?;

            if let Some(sender) = sender {
                if let Err(e) = deliver(sender, &request, &response).await {
                    error!(error = %format!("{e:#}"), request_id = %request.request_id, "Failed to deliver response");
                }
            }
        }

        info!(
            handled = summary.handled,
            failed = summary.failed,
            malformed = summary.malformed,
            "Event stream ended"
        );
        Ok(summary)
    }
}

fn connect_postgres(info: &DbConnectionInfo, config: &ManagerConfig) -> Arc<dyn RoleStore> {
    Arc::new(PgRoleStore::connect_lazy(info, config))
}

/// PUT `response` to the event's `ResponseURL`
///
/// # Errors
///
/// Fails when the event has no `ResponseURL` or the upload fails.
pub async fn deliver(
    sender: &ResponseSender,
    request: &CustomResourceRequest,
    response: &CustomResourceResponse,
) -> Result<()> {
    let url = request
        .response_url
        .as_deref()
        .context("event has no ResponseURL")?;
    sender.send(url, response).await
}
