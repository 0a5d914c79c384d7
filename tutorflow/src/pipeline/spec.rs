//! Stage specifications.

use super::retry::RetryPolicy;
use super::runner::StageRunner;
use crate::core::StageKind;
use std::sync::Arc;

/// A stage as wired into a flow.
pub struct StageSpec<S>
where
    S: Send + Sync,
{
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn StageRunner<S>>,
    /// Name of the stage that runs next. `None` ends the flow.
    pub successor: Option<String>,
    /// Stage-specific retry policy, overriding the flow default.
    pub retry: Option<RetryPolicy>,
}

impl<S> std::fmt::Debug for StageSpec<S>
where
    S: Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("kind", &self.runner.kind())
            .field("successor", &self.successor)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<S> Clone for StageSpec<S>
where
    S: Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            runner: Arc::clone(&self.runner),
            successor: self.successor.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S> StageSpec<S>
where
    S: Send + Sync,
{
    /// Creates a terminal stage specification named after its runner.
    #[must_use]
    pub fn new(runner: Arc<dyn StageRunner<S>>) -> Self {
        Self {
            name: runner.name().to_string(),
            runner,
            successor: None,
            retry: None,
        }
    }

    /// Sets the successor.
    #[must_use]
    pub fn with_successor(mut self, successor: impl Into<String>) -> Self {
        self.successor = Some(successor.into());
        self
    }

    /// Sets a stage-specific retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Single or batch.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.runner.kind()
    }

    /// Returns true if no stage follows this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.successor.is_none()
    }
}
