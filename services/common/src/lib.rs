//! Stage runtime shared by every pipeline service
//!
//! A stage is a synchronous message handler; this crate supplies the reactive
//! loop around it (receive, dispatch on error kind, publish), the latency and
//! counter instrumentation, and tracing setup.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod metrics;
pub mod stage;
pub mod telemetry;

pub use errors::{ErrorKind, StageError, StageResult};
pub use metrics::{LatencySnapshot, LatencyTracker, StageMetrics, StageMetricsSnapshot};
pub use stage::{
    Context, Inbox, Outbox, Outlet, RunFlag, Stage, StageRunner, run_flag, spawn_stage,
};
pub use telemetry::init_tracing;
