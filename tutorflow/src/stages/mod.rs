//! Stage traits.
//!
//! Stages are the fundamental units of work in a tutorflow pipeline. Each
//! invocation goes through three phases:
//!
//! - `prep` reads what the stage needs out of the shared state,
//! - `exec` performs the transformation (this is the retried part),
//! - `post` writes the result back into the shared state.
//!
//! [`BatchStage`] runs its exec once per item extracted in prep.

mod batch;

pub use batch::BatchStage;

use crate::errors::{Result, TutorflowError};
use async_trait::async_trait;
use std::fmt::Debug;

/// Attempt information handed to an exec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecContext {
    /// Zero-based attempt index.
    pub attempt: usize,
    /// Attempt budget of the stage's retry policy.
    pub max_attempts: usize,
    /// Item index, for batch stages.
    pub item_index: Option<usize>,
}

impl ExecContext {
    /// Context for the first attempt of a single exec.
    #[must_use]
    pub fn first(max_attempts: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            item_index: None,
        }
    }

    /// Returns true on the first attempt.
    #[must_use]
    pub fn is_first_attempt(&self) -> bool {
        self.attempt == 0
    }

    /// Returns true on the last allowed attempt.
    #[must_use]
    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }
}

/// Trait for pipeline stages over a shared state `S`.
#[async_trait]
pub trait Stage<S>: Send + Sync + Debug
where
    S: Send + Sync,
{
    /// Inputs extracted from the state.
    type Prep: Send + Sync;
    /// Result of the exec phase.
    type Output: Send;

    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Reads inputs from the shared state.
    ///
    /// Returns a `PreconditionError` when a required input is absent.
    fn prep(&self, state: &S) -> Result<Self::Prep>;

    /// Runs the transformation. Called again on retryable failures.
    async fn exec(&self, prep: &Self::Prep, ctx: ExecContext) -> Result<Self::Output>;

    /// Called once exec has failed for good. Re-raises by default.
    async fn exec_fallback(&self, _prep: &Self::Prep, error: TutorflowError) -> Result<Self::Output> {
        Err(error)
    }

    /// Writes the output into the shared state.
    fn post(&self, state: &mut S, prep: Self::Prep, output: Self::Output);
}

/// A stage that does nothing. Useful for wiring tests and benchmarks.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<S> Stage<S> for NoOpStage
where
    S: Send + Sync,
{
    type Prep = ();
    type Output = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn prep(&self, _state: &S) -> Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &(), _ctx: ExecContext) -> Result<()> {
        Ok(())
    }

    fn post(&self, _state: &mut S, _prep: (), _output: ()) {}
}
