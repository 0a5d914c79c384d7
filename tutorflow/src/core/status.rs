//! Stage phase and kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a stage runs its exec once or once per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Exec runs once per invocation.
    #[default]
    Single,
    /// Exec runs once per item extracted in prep.
    Batch,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Lifecycle phase of a single stage invocation.
///
/// `Preparing -> Executing -> Finalizing -> Done`, with `Failed` reachable
/// from `Preparing` (precondition) and `Executing` (retries exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// Reading inputs from the shared state.
    #[default]
    Preparing,
    /// Running the transformation.
    Executing,
    /// Writing outputs back to the shared state.
    Finalizing,
    /// Completed.
    Done,
    /// Halted with an error.
    Failed,
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => write!(f, "preparing"),
            Self::Executing => write!(f, "executing"),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StagePhase {
    /// Returns true if the phase is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if `next` is a legal transition from this phase.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Preparing, Self::Executing | Self::Failed)
                | (Self::Executing, Self::Finalizing | Self::Failed)
                | (Self::Finalizing, Self::Done)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Single.to_string(), "single");
        assert_eq!(StageKind::Batch.to_string(), "batch");
    }

    #[test]
    fn test_stage_phase_display() {
        assert_eq!(StagePhase::Preparing.to_string(), "preparing");
        assert_eq!(StagePhase::Done.to_string(), "done");
        assert_eq!(StagePhase::Failed.to_string(), "failed");
    }

    #[test]
    fn test_stage_phase_is_terminal() {
        assert!(StagePhase::Done.is_terminal());
        assert!(StagePhase::Failed.is_terminal());
        assert!(!StagePhase::Preparing.is_terminal());
        assert!(!StagePhase::Executing.is_terminal());
        assert!(!StagePhase::Finalizing.is_terminal());
    }

    #[test]
    fn test_stage_phase_transitions() {
        assert!(StagePhase::Preparing.can_transition_to(StagePhase::Executing));
        assert!(StagePhase::Preparing.can_transition_to(StagePhase::Failed));
        assert!(StagePhase::Executing.can_transition_to(StagePhase::Failed));
        assert!(StagePhase::Finalizing.can_transition_to(StagePhase::Done));
        assert!(!StagePhase::Finalizing.can_transition_to(StagePhase::Failed));
        assert!(!StagePhase::Done.can_transition_to(StagePhase::Preparing));
    }

    #[test]
    fn test_stage_phase_serialize() {
        let json = serde_json::to_string(&StagePhase::Finalizing).unwrap();
        assert_eq!(json, r#""finalizing""#);

        let deserialized: StagePhase = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StagePhase::Finalizing);
    }
}
