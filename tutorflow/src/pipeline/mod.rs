//! Flow building and execution.
//!
//! This module provides:
//! - Stage specifications and successor wiring
//! - A flow builder with validation
//! - The sequential flow engine
//! - Per-stage retry policies

mod builder;
mod flow;
mod retry;
mod runner;
mod spec;

pub use builder::FlowBuilder;
pub use flow::Flow;
pub use retry::{
    run_attempts, should_retry, with_retry, Attempted, RetryDecision, RetryPolicy, RetryState,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT_MS,
};
pub use runner::{BatchRunner, RunEnv, SingleRunner, StageRunner};
pub use spec::StageSpec;
