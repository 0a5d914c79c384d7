//! Object-safe stage runners.
//!
//! [`Stage`] and [`BatchStage`] carry associated types, so the flow stores
//! them behind [`StageRunner`], which drives the three phases and applies
//! the stage's retry policy around exec.

use super::retry::{run_attempts, RetryPolicy};
use crate::core::{StageKind, StageReport};
use crate::errors::Result;
use crate::events::{self, EventSink};
use crate::stages::{BatchStage, ExecContext, Stage};
use async_trait::async_trait;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Instant;

/// Everything a runner needs from the flow for one invocation.
#[derive(Clone, Copy)]
pub struct RunEnv<'a> {
    /// Retry policy of the stage being run.
    pub policy: &'a RetryPolicy,
    /// Lifecycle event sink.
    pub sink: &'a dyn EventSink,
    /// Maximum batch items in flight. 1 means sequential.
    pub batch_concurrency: usize,
}

impl Debug for RunEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEnv")
            .field("policy", self.policy)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish_non_exhaustive()
    }
}

/// Type-erased stage, as stored in a flow.
#[async_trait]
pub trait StageRunner<S>: Send + Sync + Debug
where
    S: Send + Sync,
{
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Single or batch.
    fn kind(&self) -> StageKind;

    /// Runs prep, exec (under retry) and post against the shared state.
    async fn run(&self, state: &mut S, env: RunEnv<'_>) -> Result<StageReport>;
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn emit_retry(sink: &dyn EventSink, stage: &str, item: Option<usize>, attempt: usize, error: &str) {
    sink.try_emit(
        events::STAGE_RETRY,
        Some(serde_json::json!({
            "stage": stage,
            "item": item,
            "attempt": attempt,
            "error": error,
        })),
    );
}

/// Runner for a [`Stage`].
pub struct SingleRunner<T, S> {
    stage: T,
    _state: PhantomData<fn(&mut S)>,
}

impl<T, S> SingleRunner<T, S> {
    /// Wraps a stage.
    pub fn new(stage: T) -> Self {
        Self {
            stage,
            _state: PhantomData,
        }
    }
}

impl<T: Debug, S> Debug for SingleRunner<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SingleRunner").field(&self.stage).finish()
    }
}

#[async_trait]
impl<T, S> StageRunner<S> for SingleRunner<T, S>
where
    S: Send + Sync,
    T: Stage<S>,
{
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn kind(&self) -> StageKind {
        StageKind::Single
    }

    async fn run(&self, state: &mut S, env: RunEnv<'_>) -> Result<StageReport> {
        let start = Instant::now();
        let name = self.stage.name();
        env.sink
            .emit(
                events::STAGE_STARTED,
                Some(serde_json::json!({"stage": name, "kind": "single"})),
            )
            .await;

        let prep = self.stage.prep(state)?;

        let max_attempts = env.policy.attempts();
        let attempted = run_attempts(
            env.policy,
            name,
            |attempt| {
                let ctx = ExecContext {
                    attempt,
                    max_attempts,
                    item_index: None,
                };
                self.stage.exec(&prep, ctx)
            },
            |attempt, error, _| emit_retry(env.sink, name, None, attempt, &error.to_string()),
        )
        .await;

        let output = match attempted.result {
            Ok(output) => output,
            Err(error) => self.stage.exec_fallback(&prep, error).await?,
        };

        self.stage.post(state, prep, output);

        let report = StageReport::done(name, StageKind::Single, attempted.attempts, elapsed_ms(start));
        env.sink
            .emit(
                events::STAGE_COMPLETED,
                Some(serde_json::json!({
                    "stage": name,
                    "attempts": report.attempts,
                    "duration_ms": report.duration_ms,
                })),
            )
            .await;
        Ok(report)
    }
}

/// Runner for a [`BatchStage`].
pub struct BatchRunner<B, S> {
    stage: B,
    _state: PhantomData<fn(&mut S)>,
}

impl<B, S> BatchRunner<B, S> {
    /// Wraps a batch stage.
    pub fn new(stage: B) -> Self {
        Self {
            stage,
            _state: PhantomData,
        }
    }
}

impl<B: Debug, S> Debug for BatchRunner<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BatchRunner").field(&self.stage).finish()
    }
}

impl<B, S> BatchRunner<B, S>
where
    S: Send + Sync,
    B: BatchStage<S>,
{
    async fn run_item(
        &self,
        index: usize,
        item: &B::Item,
        env: RunEnv<'_>,
    ) -> Result<(B::ItemOutput, usize)> {
        let name = self.stage.name();
        let max_attempts = env.policy.attempts();
        let attempted = run_attempts(
            env.policy,
            name,
            |attempt| {
                let ctx = ExecContext {
                    attempt,
                    max_attempts,
                    item_index: Some(index),
                };
                self.stage.exec_item(item, ctx)
            },
            |attempt, error, _| emit_retry(env.sink, name, Some(index), attempt, &error.to_string()),
        )
        .await;

        let output = match attempted.result {
            Ok(output) => output,
            Err(error) => self.stage.exec_item_fallback(item, error).await?,
        };
        Ok((output, attempted.attempts))
    }
}

#[async_trait]
impl<B, S> StageRunner<S> for BatchRunner<B, S>
where
    S: Send + Sync,
    B: BatchStage<S>,
{
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn kind(&self) -> StageKind {
        StageKind::Batch
    }

    async fn run(&self, state: &mut S, env: RunEnv<'_>) -> Result<StageReport> {
        let start = Instant::now();
        let name = self.stage.name();
        env.sink
            .emit(
                events::STAGE_STARTED,
                Some(serde_json::json!({"stage": name, "kind": "batch"})),
            )
            .await;

        let items = self.stage.prep(state)?;
        let count = items.len();
        tracing::debug!(stage = name, items = count, concurrency = env.batch_concurrency, "Running batch");

        // buffered() yields in input order, so positions survive concurrency.
        let results: Vec<(B::ItemOutput, usize)> = if env.batch_concurrency <= 1 {
            let mut results = Vec::with_capacity(count);
            for (index, item) in items.iter().enumerate() {
                results.push(self.run_item(index, item, env).await?);
            }
            results
        } else {
            let pending: Vec<_> = items
                .iter()
                .enumerate()
                .map(|(index, item)| self.run_item(index, item, env).boxed())
                .collect();
            stream::iter(pending)
                .buffered(env.batch_concurrency)
                .try_collect()
                .await?
        };

        let attempts = results.iter().map(|(_, attempts)| attempts).sum();
        let outputs = results.into_iter().map(|(output, _)| output).collect();
        self.stage.post(state, items, outputs);

        let report = StageReport::done(name, StageKind::Batch, attempts, elapsed_ms(start)).with_items(count);
        env.sink
            .emit(
                events::STAGE_COMPLETED,
                Some(serde_json::json!({
                    "stage": name,
                    "items": count,
                    "attempts": report.attempts,
                    "duration_ms": report.duration_ms,
                })),
            )
            .await;
        Ok(report)
    }
}
