//! Execution reports returned by the flow engine.

use super::{StageKind, StagePhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one stage invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// The stage name.
    pub name: String,
    /// Single or batch.
    pub kind: StageKind,
    /// Final phase reached (`Done` or `Failed`).
    pub phase: StagePhase,
    /// Exec attempts made, summed over items for batch stages.
    pub attempts: usize,
    /// Number of items processed, for batch stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
    /// Wall-clock time in milliseconds.
    pub duration_ms: f64,
}

impl StageReport {
    /// Creates a report for a completed stage.
    #[must_use]
    pub fn done(name: impl Into<String>, kind: StageKind, attempts: usize, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            phase: StagePhase::Done,
            attempts,
            items: None,
            duration_ms,
        }
    }

    /// Records the item count.
    #[must_use]
    pub fn with_items(mut self, items: usize) -> Self {
        self.items = Some(items);
        self
    }
}

/// Outcome of a complete flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// The flow name.
    pub flow_name: String,
    /// Stages in the order they completed.
    pub stages: Vec<StageReport>,
    /// Total wall-clock time in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Creates an empty report for a new run.
    #[must_use]
    pub fn new(flow_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            flow_name: flow_name.into(),
            stages: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Names of the stages that ran, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Looks up the report for a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_report_lookup() {
        let mut report = RunReport::new("tutorial");
        report.stages.push(StageReport::done("fetch", StageKind::Single, 1, 2.0));
        report
            .stages
            .push(StageReport::done("write", StageKind::Batch, 5, 9.0).with_items(5));

        assert_eq!(report.stage_names(), vec!["fetch", "write"]);
        assert_eq!(report.stage("write").and_then(|s| s.items), Some(5));
        assert!(report.stage("missing").is_none());
    }

    #[test]
    fn test_stage_report_serialize_skips_items() {
        let report = StageReport::done("fetch", StageKind::Single, 1, 1.5);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("items").is_none());
        assert_eq!(json["phase"], "done");
    }
}
