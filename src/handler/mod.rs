//! # Custom Resource Handler
//!
//! Maps CloudFormation lifecycle events onto the reconciler.
//!
//! | RequestType | Action |
//! |-------------|--------|
//! | `Create`    | `apply_role_changes(roles, None)` |
//! | `Update`    | `apply_role_changes(roles, old roles)` |
//! | `Delete`    | `delete_all_roles(roles)` |
//!
//! Fatal errors become a `FAILED` response carrying the error message.

pub mod event;
pub mod response;

pub use event::{CustomResourceRequest, CustomResourceResponse, RequestType, ResponseStatus, RoleProperties};
pub use response::ResponseSender;

use crate::error::{Result, RoleManagerError};
use crate::observability::metrics;
use crate::reconciler::{ReconcileReport, RoleReconciler};
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

/// Run the lifecycle operation an event asks for
///
/// # Errors
///
/// [`RoleManagerError::InvalidRequestType`] for an unknown `RequestType`,
/// [`RoleManagerError::MissingRoles`] when Create/Update carry no `roles`,
/// plus whatever the reconciler raises.
pub async fn dispatch(reconciler: &RoleReconciler, request: &CustomResourceRequest) -> Result<ReconcileReport> {
    let request_type = RequestType::parse(&request.request_type)
        .ok_or_else(|| RoleManagerError::InvalidRequestType(request.request_type.clone()))?;

    match request_type {
        RequestType::Create => {
            let roles = request
                .resource_properties
                .roles
                .as_deref()
                .ok_or(RoleManagerError::MissingRoles)?;
            reconciler.apply_role_changes(roles, None).await
        }
        RequestType::Update => {
            let roles = request
                .resource_properties
                .roles
                .as_deref()
                .ok_or(RoleManagerError::MissingRoles)?;
            let previous = request
                .old_resource_properties
                .as_ref()
                .and_then(|p| p.roles.as_deref());
            reconciler.apply_role_changes(roles, previous).await
        }
        RequestType::Delete => {
            let roles = request.resource_properties.roles.as_deref().unwrap_or_default();
            Ok(reconciler.delete_all_roles(roles).await)
        }
    }
}

/// Handle one event and build the response document
///
/// Never fails; fatal errors produce a `FAILED` response.
pub async fn handle_event(reconciler: &RoleReconciler, request: &CustomResourceRequest) -> CustomResourceResponse {
    let span = info_span!(
        "cfn.request",
        request_type = %request.request_type,
        request_id = %request.request_id,
        logical_resource_id = %request.logical_resource_id
    );

    async move {
        let start = Instant::now();
        metrics::increment_invocations(&request.request_type);
        info!("Handling custom resource request");

        let response = match dispatch(reconciler, request).await {
            Ok(report) => {
                info!(
                    failed_operations = report.failures().count(),
                    "Custom resource request succeeded"
                );
                CustomResourceResponse::success(request, report.response_data())
            }
            Err(e) => {
                metrics::increment_invocation_errors();
                error!(error = %e, "Custom resource request failed");
                failure_response(request, &e)
            }
        };

        metrics::observe_invocation_duration(start.elapsed().as_secs_f64());
        response
    }
    .instrument(span)
    .await
}

/// `FAILED` response for an error raised outside [`dispatch`], e.g. while connecting
#[must_use]
pub fn failure_response(request: &CustomResourceRequest, error: &RoleManagerError) -> CustomResourceResponse {
    CustomResourceResponse::failed(request, error.to_string())
}
