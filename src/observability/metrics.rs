//! # Metrics
//!
//! Prometheus metrics for the role manager.
//!
//! ## Metrics Exposed
//!
//! - `db_role_manager_invocations_total` - Lifecycle invocations by request type
//! - `db_role_manager_invocation_errors_total` - Invocations that ended in a fatal error
//! - `db_role_manager_invocation_duration_seconds` - Duration of invocations
//! - `db_role_manager_roles_created_total` - Login roles created
//! - `db_role_manager_roles_dropped_total` - Roles dropped (successful batches only)
//! - `db_role_manager_membership_syncs_total` - Per-role membership syncs committed
//! - `db_role_manager_membership_sync_failures_total` - Per-role syncs rolled back
//! - `db_role_manager_credential_operation_errors_total` - Failed credential store calls by store

use anyhow::Result;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static INVOCATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "db_role_manager_invocations_total",
            "Total number of custom-resource invocations",
        ),
        &["request_type"],
    )
    .expect("Failed to create INVOCATIONS_TOTAL metric - this should never happen")
});

static INVOCATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "db_role_manager_invocation_errors_total",
        "Total number of invocations that failed",
    )
    .expect("Failed to create INVOCATION_ERRORS_TOTAL metric - this should never happen")
});

static INVOCATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "db_role_manager_invocation_duration_seconds",
            "Duration of custom-resource invocations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create INVOCATION_DURATION metric - this should never happen")
});

static ROLES_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "db_role_manager_roles_created_total",
        "Total number of login roles created",
    )
    .expect("Failed to create ROLES_CREATED_TOTAL metric - this should never happen")
});

static ROLES_DROPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "db_role_manager_roles_dropped_total",
        "Total number of roles dropped",
    )
    .expect("Failed to create ROLES_DROPPED_TOTAL metric - this should never happen")
});

static MEMBERSHIP_SYNCS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "db_role_manager_membership_syncs_total",
        "Total number of committed role membership syncs",
    )
    .expect("Failed to create MEMBERSHIP_SYNCS_TOTAL metric - this should never happen")
});

static MEMBERSHIP_SYNC_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "db_role_manager_membership_sync_failures_total",
        "Total number of role membership syncs rolled back",
    )
    .expect("Failed to create MEMBERSHIP_SYNC_FAILURES_TOTAL metric - this should never happen")
});

static CREDENTIAL_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "db_role_manager_credential_operation_errors_total",
            "Total number of failed credential store operations",
        ),
        &["store"],
    )
    .expect("Failed to create CREDENTIAL_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry
///
/// # Errors
///
/// Fails if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(INVOCATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVOCATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVOCATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(ROLES_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROLES_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MEMBERSHIP_SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MEMBERSHIP_SYNC_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_OPERATION_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_invocations(request_type: &str) {
    INVOCATIONS_TOTAL.with_label_values(&[request_type]).inc();
}

pub fn increment_invocation_errors() {
    INVOCATION_ERRORS_TOTAL.inc();
}

pub fn observe_invocation_duration(duration: f64) {
    INVOCATION_DURATION.observe(duration);
}

pub fn increment_roles_created() {
    ROLES_CREATED_TOTAL.inc();
}

pub fn increment_roles_dropped(count: usize) {
    ROLES_DROPPED_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn increment_membership_syncs() {
    MEMBERSHIP_SYNCS_TOTAL.inc();
}

pub fn increment_membership_sync_failures() {
    MEMBERSHIP_SYNC_FAILURES_TOTAL.inc();
}

pub fn increment_credential_operation_errors(store: &str) {
    CREDENTIAL_OPERATION_ERRORS_TOTAL
        .with_label_values(&[store])
        .inc();
}

/// Render the registry in the Prometheus text format
///
/// # Errors
///
/// Fails if encoding fails or the output is not UTF-8.
pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
