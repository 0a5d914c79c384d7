//! Flow builder with validation.

use super::flow::Flow;
use super::retry::RetryPolicy;
use super::runner::{BatchRunner, SingleRunner, StageRunner};
use super::spec::StageSpec;
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{BatchStage, Stage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for creating validated flows.
///
/// Stages are registered first and wired afterwards by name. Structural
/// problems that only show once the wiring is complete (unknown successors,
/// cycles, a missing start stage) are reported by [`FlowBuilder::build`].
pub struct FlowBuilder<S>
where
    S: Send + Sync,
{
    name: String,
    stages: HashMap<String, StageSpec<S>>,
    stage_order: Vec<String>,
    start: Option<String>,
    default_retry: RetryPolicy,
    sink: Arc<dyn EventSink>,
    batch_concurrency: usize,
}

impl<S> std::fmt::Debug for FlowBuilder<S>
where
    S: Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowBuilder")
            .field("name", &self.name)
            .field("stage_order", &self.stage_order)
            .field("start", &self.start)
            .field("default_retry", &self.default_retry)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish_non_exhaustive()
    }
}

impl<S> FlowBuilder<S>
where
    S: Send + Sync + 'static,
{
    /// Creates a new flow builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            stage_order: Vec::new(),
            start: None,
            default_retry: RetryPolicy::default(),
            sink: Arc::new(NoOpEventSink),
            batch_concurrency: 1,
        }
    }

    /// Adds a single stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name is already registered.
    pub fn stage<T>(self, stage: T) -> Result<Self, PipelineValidationError>
    where
        T: Stage<S> + 'static,
    {
        self.add_runner(Arc::new(SingleRunner::new(stage)))
    }

    /// Adds a batch stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name is already registered.
    pub fn batch_stage<B>(self, stage: B) -> Result<Self, PipelineValidationError>
    where
        B: BatchStage<S> + 'static,
    {
        self.add_runner(Arc::new(BatchRunner::new(stage)))
    }

    /// Adds an already erased runner.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name is already registered.
    pub fn add_runner(mut self, runner: Arc<dyn StageRunner<S>>) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(StageSpec::new(runner))?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name is already registered.
    pub fn add_stage_spec(&mut self, spec: StageSpec<S>) -> Result<(), PipelineValidationError> {
        if self.stages.contains_key(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is registered twice",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "FLOW-005-DUPLICATE",
                    format!("Duplicate stage name '{}'", spec.name),
                )
                .with_fix_hint("Give every stage in a flow a unique name."),
            ));
        }

        self.stage_order.push(spec.name.clone());
        self.stages.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Sets `to` as the successor of `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` is not registered or if `from == to`.
    pub fn connect(mut self, from: &str, to: &str) -> Result<Self, PipelineValidationError> {
        if from == to {
            return Err(PipelineValidationError::new(format!(
                "Stage '{from}' cannot be its own successor"
            ))
            .with_stages(vec![from.to_string()])
            .with_error_info(
                ContractErrorInfo::new("FLOW-003-SELF", format!("Self-successor on '{from}'"))
                    .with_fix_hint("Leave the successor empty to end the flow at this stage."),
            ));
        }

        let spec = self
            .stages
            .get_mut(from)
            .ok_or_else(|| unknown_stage(from))?;
        spec.successor = Some(to.to_string());
        Ok(self)
    }

    /// Wires the registered stages into a straight line, in insertion order.
    ///
    /// # Errors
    ///
    /// Never fails for registered stages; kept fallible for symmetry with
    /// [`FlowBuilder::connect`].
    pub fn chain(mut self) -> Result<Self, PipelineValidationError> {
        let order = self.stage_order.clone();
        for pair in order.windows(2) {
            self = self.connect(&pair[0], &pair[1])?;
        }
        Ok(self)
    }

    /// Designates the start stage. Defaults to the first registered stage.
    #[must_use]
    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Overrides the retry policy of one stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is not registered.
    pub fn with_retry(mut self, stage: &str, policy: RetryPolicy) -> Result<Self, PipelineValidationError> {
        let spec = self
            .stages
            .get_mut(stage)
            .ok_or_else(|| unknown_stage(stage))?;
        spec.retry = Some(policy);
        Ok(self)
    }

    /// Sets the retry policy used by stages without an override.
    #[must_use]
    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets how many batch items may run at once. Values below 1 mean 1.
    #[must_use]
    pub fn batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    /// Returns the flow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the wiring and builds the flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is empty, the start stage is unknown, a
    /// successor names an unknown stage, or the successor chain has a cycle.
    pub fn build(self) -> Result<Flow<S>, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Flow has no stages").with_error_info(
                ContractErrorInfo::new("FLOW-001-EMPTY", "Cannot build an empty flow")
                    .with_fix_hint("Add at least one stage to the flow before building."),
            ));
        }

        let start = match self.start.clone() {
            Some(start) => start,
            None => self.stage_order[0].clone(),
        };
        if !self.stages.contains_key(&start) {
            return Err(unknown_stage(&start));
        }

        for name in &self.stage_order {
            if let Some(successor) = self.stages.get(name).and_then(|s| s.successor.as_ref()) {
                if !self.stages.contains_key(successor) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{name}' names unknown successor '{successor}'"
                    ))
                    .with_stages(vec![name.clone(), successor.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "FLOW-002-UNKNOWN_SUCCESSOR",
                            format!("Successor '{successor}' not found"),
                        )
                        .with_context_entry("stage", name.clone())
                        .with_fix_hint("Register the successor stage before building."),
                    ));
                }
            }
        }

        self.detect_cycles()?;

        let reachable = self.reachable_from(&start);
        for name in &self.stage_order {
            if !reachable.contains(name.as_str()) {
                tracing::debug!(flow = %self.name, stage = %name, "Stage is unreachable from the start stage");
            }
        }

        Ok(Flow::new(
            self.name,
            self.stages,
            self.stage_order,
            start,
            self.default_retry,
            self.sink,
            self.batch_concurrency,
        ))
    }

    fn reachable_from(&self, start: &str) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut current = self.stages.get_key_value(start).map(|(k, _)| k.as_str());
        while let Some(name) = current {
            if !seen.insert(name) {
                break;
            }
            current = self
                .stages
                .get(name)
                .and_then(|s| s.successor.as_deref())
                .and_then(|next| self.stages.get_key_value(next).map(|(k, _)| k.as_str()));
        }
        seen
    }

    /// Detects cycles in the successor chain.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.stage_order {
            if !visited.contains(name) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(next) = self.stages.get(node).and_then(|s| s.successor.as_ref()) {
            if !visited.contains(next) {
                if let Some(cycle) = self.dfs_cycle(next, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(next) {
                let cycle_start = path.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                cycle.push(next.clone());
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

fn unknown_stage(name: &str) -> PipelineValidationError {
    PipelineValidationError::new(format!("Unknown stage '{name}'"))
        .with_stages(vec![name.to_string()])
        .with_error_info(
            ContractErrorInfo::new("FLOW-002-UNKNOWN_STAGE", format!("Stage '{name}' not found"))
                .with_fix_hint("Register the stage before referring to it."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;
    use pretty_assertions::assert_eq;

    fn builder(names: &[&str]) -> FlowBuilder<()> {
        names.iter().fold(FlowBuilder::new("test"), |b, name| {
            b.stage(NoOpStage::new(*name)).unwrap()
        })
    }

    #[test]
    fn test_builder_creation() {
        let builder: FlowBuilder<()> = FlowBuilder::new("test");
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_empty_build() {
        let err = FlowBuilder::<()>::new("test").build().unwrap_err();
        assert_eq!(err.code(), Some("FLOW-001-EMPTY"));
    }

    #[test]
    fn test_builder_duplicate_stage() {
        let err = builder(&["a"]).stage(NoOpStage::new("a")).unwrap_err();
        assert_eq!(err.code(), Some("FLOW-005-DUPLICATE"));
        assert_eq!(err.stages, vec!["a".to_string()]);
    }

    #[test]
    fn test_builder_self_successor() {
        let err = builder(&["a"]).connect("a", "a").unwrap_err();
        assert_eq!(err.code(), Some("FLOW-003-SELF"));
    }

    #[test]
    fn test_builder_connect_unknown_source() {
        let err = builder(&["a"]).connect("missing", "a").unwrap_err();
        assert_eq!(err.code(), Some("FLOW-002-UNKNOWN_STAGE"));
    }

    #[test]
    fn test_builder_unknown_successor() {
        let err = builder(&["a"]).connect("a", "ghost").unwrap().build().unwrap_err();
        assert_eq!(err.code(), Some("FLOW-002-UNKNOWN_SUCCESSOR"));
        assert_eq!(err.stages, vec!["a".to_string(), "ghost".to_string()]);
    }

    #[test]
    fn test_builder_unknown_start() {
        let err = builder(&["a"]).start("nope").build().unwrap_err();
        assert_eq!(err.code(), Some("FLOW-002-UNKNOWN_STAGE"));
    }

    #[test]
    fn test_builder_cycle_detection() {
        let err = builder(&["a", "b", "c"])
            .chain()
            .unwrap()
            .connect("c", "a")
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("FLOW-004-CYCLE"));
        assert_eq!(err.stages, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_builder_chain_wires_insertion_order() {
        let flow = builder(&["fetch", "identify", "write"]).chain().unwrap().build().unwrap();

        assert_eq!(flow.start_stage(), "fetch");
        assert_eq!(flow.successor_of("fetch"), Some("identify"));
        assert_eq!(flow.successor_of("identify"), Some("write"));
        assert_eq!(flow.successor_of("write"), None);
        assert_eq!(flow.execution_order(), vec!["fetch", "identify", "write"]);
    }

    #[test]
    fn test_builder_retry_override() {
        let flow = builder(&["a", "b"])
            .default_retry(RetryPolicy::new().with_max_attempts(4))
            .with_retry("b", RetryPolicy::no_retry())
            .unwrap()
            .chain()
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(flow.policy_for("a").map(|p| p.max_attempts), Some(4));
        assert_eq!(flow.policy_for("b").map(|p| p.max_attempts), Some(1));
        assert!(flow.policy_for("c").is_none());
    }

    #[test]
    fn test_builder_retry_override_unknown_stage() {
        let err = builder(&["a"]).with_retry("b", RetryPolicy::no_retry()).unwrap_err();
        assert_eq!(err.code(), Some("FLOW-002-UNKNOWN_STAGE"));
    }
}
