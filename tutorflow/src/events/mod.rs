//! Event sink system for observability.
//!
//! The flow engine reports stage lifecycle transitions through an
//! [`EventSink`]. Event types are namespaced strings with a JSON payload.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A flow run started.
pub const FLOW_STARTED: &str = "flow.started";
/// A flow run reached a stage without successor.
pub const FLOW_COMPLETED: &str = "flow.completed";
/// A flow run halted on a failed stage.
pub const FLOW_FAILED: &str = "flow.failed";
/// A stage entered its prep phase.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage exec attempt failed and will be retried.
pub const STAGE_RETRY: &str = "stage.retry";
/// A stage finished its post phase.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed and the run halts.
pub const STAGE_FAILED: &str = "stage.failed";
