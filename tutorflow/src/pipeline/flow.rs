//! Flow execution.

use super::retry::RetryPolicy;
use super::runner::RunEnv;
use super::spec::StageSpec;
use crate::core::RunReport;
use crate::errors::{PreconditionError, Result};
use crate::events::{self, EventSink};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A validated chain of stages over a shared state `S`.
///
/// Built by [`super::FlowBuilder`]. A flow can be run any number of times;
/// each run owns nothing but the state it is handed.
pub struct Flow<S>
where
    S: Send + Sync,
{
    name: String,
    stages: HashMap<String, StageSpec<S>>,
    stage_order: Vec<String>,
    start: String,
    default_retry: RetryPolicy,
    sink: Arc<dyn EventSink>,
    batch_concurrency: usize,
}

impl<S> std::fmt::Debug for Flow<S>
where
    S: Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("stage_order", &self.stage_order)
            .field("default_retry", &self.default_retry)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish_non_exhaustive()
    }
}

impl<S> Flow<S>
where
    S: Send + Sync,
{
    pub(super) fn new(
        name: String,
        stages: HashMap<String, StageSpec<S>>,
        stage_order: Vec<String>,
        start: String,
        default_retry: RetryPolicy,
        sink: Arc<dyn EventSink>,
        batch_concurrency: usize,
    ) -> Self {
        Self {
            name,
            stages,
            stage_order,
            start,
            default_retry,
            sink,
            batch_concurrency,
        }
    }

    /// Returns the flow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the start stage.
    #[must_use]
    pub fn start_stage(&self) -> &str {
        &self.start
    }

    /// Registered stage names, in registration order.
    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        &self.stage_order
    }

    /// Returns the successor of a stage, if it has one.
    #[must_use]
    pub fn successor_of(&self, stage: &str) -> Option<&str> {
        self.stages.get(stage).and_then(|s| s.successor.as_deref())
    }

    /// Returns the retry policy that applies to a stage.
    #[must_use]
    pub fn policy_for(&self, stage: &str) -> Option<&RetryPolicy> {
        self.stages
            .get(stage)
            .map(|s| s.retry.as_ref().unwrap_or(&self.default_retry))
    }

    /// Stage names in the order a successful run visits them.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        let mut order = Vec::new();
        let mut current = Some(self.start.as_str());
        while let Some(name) = current {
            order.push(name);
            current = self.successor_of(name);
        }
        order
    }

    /// Runs the flow from the start stage until a stage has no successor.
    ///
    /// The first failing stage halts the run. Its error is returned as is,
    /// and no later stage runs.
    ///
    /// # Errors
    ///
    /// Returns the error of the stage that failed.
    pub async fn run(&self, state: &mut S) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(&self.name);
        let run_id = report.run_id.to_string();

        tracing::info!(flow = %self.name, run_id = %run_id, start = %self.start, "Flow started");
        self.sink
            .emit(
                events::FLOW_STARTED,
                Some(serde_json::json!({"flow": self.name, "run_id": run_id})),
            )
            .await;

        let mut current = Some(self.start.clone());
        while let Some(name) = current {
            let spec = self
                .stages
                .get(&name)
                .ok_or_else(|| PreconditionError::new(&self.name, name.clone(), "is not a registered stage"))?;
            let env = RunEnv {
                policy: spec.retry.as_ref().unwrap_or(&self.default_retry),
                sink: self.sink.as_ref(),
                batch_concurrency: self.batch_concurrency,
            };

            match spec.runner.run(state, env).await {
                Ok(stage_report) => {
                    tracing::debug!(
                        flow = %self.name,
                        stage = %name,
                        attempts = stage_report.attempts,
                        duration_ms = stage_report.duration_ms,
                        "Stage completed"
                    );
                    report.stages.push(stage_report);
                }
                Err(error) => {
                    tracing::error!(flow = %self.name, stage = %name, kind = error.kind(), error = %error, "Stage failed");
                    self.sink
                        .emit(
                            events::STAGE_FAILED,
                            Some(serde_json::json!({
                                "stage": name,
                                "kind": error.kind(),
                                "error": error.to_string(),
                            })),
                        )
                        .await;
                    self.sink
                        .emit(
                            events::FLOW_FAILED,
                            Some(serde_json::json!({
                                "flow": self.name,
                                "run_id": run_id,
                                "stage": name,
                            })),
                        )
                        .await;
                    return Err(error);
                }
            }

            current = spec.successor.clone();
        }

        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            flow = %self.name,
            run_id = %run_id,
            stages = report.stages.len(),
            duration_ms = report.duration_ms,
            "Flow completed"
        );
        self.sink
            .emit(
                events::FLOW_COMPLETED,
                Some(serde_json::json!({
                    "flow": self.name,
                    "run_id": run_id,
                    "stages": report.stage_names(),
                    "duration_ms": report.duration_ms,
                })),
            )
            .await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ExternalServiceError, TutorflowError};
    use crate::events::CollectingEventSink;
    use crate::pipeline::FlowBuilder;
    use crate::stages::{ExecContext, Stage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Trail {
        visited: Vec<String>,
    }

    #[derive(Debug)]
    struct Mark {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Mark {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::ok(name)
            }
        }
    }

    #[async_trait]
    impl Stage<Trail> for Mark {
        type Prep = ();
        type Output = String;

        fn name(&self) -> &str {
            self.name
        }

        fn prep(&self, _state: &Trail) -> Result<()> {
            Ok(())
        }

        async fn exec(&self, _prep: &(), _ctx: ExecContext) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExternalServiceError::new("mock", "down").into());
            }
            Ok(self.name.to_string())
        }

        fn post(&self, state: &mut Trail, _prep: (), output: String) {
            state.visited.push(output);
        }
    }

    #[tokio::test]
    async fn test_flow_follows_successors() {
        let flow = FlowBuilder::new("test")
            .stage(Mark::ok("c"))
            .unwrap()
            .stage(Mark::ok("a"))
            .unwrap()
            .stage(Mark::ok("b"))
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .connect("b", "c")
            .unwrap()
            .start("a")
            .build()
            .unwrap();

        let mut state = Trail::default();
        let report = flow.run(&mut state).await.unwrap();

        assert_eq!(state.visited, vec!["a", "b", "c"]);
        assert_eq!(report.stage_names(), vec!["a", "b", "c"]);
        assert_eq!(report.flow_name, "test");
    }

    #[tokio::test]
    async fn test_flow_stops_at_terminal_stage() {
        let flow = FlowBuilder::new("test")
            .stage(Mark::ok("a"))
            .unwrap()
            .stage(Mark::ok("orphan"))
            .unwrap()
            .build()
            .unwrap();

        let mut state = Trail::default();
        flow.run(&mut state).await.unwrap();

        assert_eq!(state.visited, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flow_halts_on_failure() {
        let sink = Arc::new(CollectingEventSink::new());
        let flow = FlowBuilder::new("test")
            .stage(Mark::ok("a"))
            .unwrap()
            .stage(Mark::failing("b"))
            .unwrap()
            .stage(Mark::ok("c"))
            .unwrap()
            .chain()
            .unwrap()
            .default_retry(RetryPolicy::new().with_max_attempts(3).with_wait_ms(50))
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let mut state = Trail::default();
        let err = flow.run(&mut state).await.unwrap_err();

        assert!(matches!(err, TutorflowError::ExternalService(_)));
        assert_eq!(state.visited, vec!["a"]);
        assert_eq!(sink.events_of_type("stage.retry").len(), 2);
        assert_eq!(sink.events_of_type("stage.failed").len(), 1);
        assert_eq!(sink.events_of_type("flow.failed").len(), 1);
        assert!(sink.events_of_type("flow.completed").is_empty());

        let started: Vec<_> = sink
            .events_of_type("stage.started")
            .into_iter()
            .filter_map(|(_, data)| data.map(|d| d["stage"].clone()))
            .collect();
        assert_eq!(started, vec![serde_json::json!("a"), serde_json::json!("b")]);
    }

    #[tokio::test]
    async fn test_flow_emits_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let flow = FlowBuilder::new("test")
            .stage(Mark::ok("a"))
            .unwrap()
            .stage(Mark::ok("b"))
            .unwrap()
            .chain()
            .unwrap()
            .event_sink(sink.clone())
            .build()
            .unwrap();

        flow.run(&mut Trail::default()).await.unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                "flow.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "flow.completed",
            ]
        );
    }

    #[tokio::test]
    async fn test_flow_is_reusable() {
        let flow = FlowBuilder::new("test")
            .stage(Mark::ok("a"))
            .unwrap()
            .build()
            .unwrap();

        let first = flow.run(&mut Trail::default()).await.unwrap();
        let second = flow.run(&mut Trail::default()).await.unwrap();
        assert_ne!(first.run_id, second.run_id);
    }
}
