//! # Observability
//!
//! - `logging`: tracing subscriber setup (JSON or text)
//! - `metrics`: Prometheus counters for invocations, role changes and
//!   best-effort failures

pub mod logging;
pub mod metrics;
