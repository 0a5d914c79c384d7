//! Batch stage trait.

use crate::errors::{Result, TutorflowError};
use crate::stages::ExecContext;
use async_trait::async_trait;
use std::fmt::Debug;

/// A stage whose exec runs independently for every item extracted in prep.
///
/// Outputs are collected positionally: output `i` belongs to item `i`. A
/// failure on any item fails the whole stage and nothing is written back.
#[async_trait]
pub trait BatchStage<S>: Send + Sync + Debug
where
    S: Send + Sync,
{
    /// One unit of work.
    type Item: Send + Sync;
    /// Result for one item.
    type ItemOutput: Send;

    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Extracts the items from the shared state.
    fn prep(&self, state: &S) -> Result<Vec<Self::Item>>;

    /// Transforms a single item. Must not depend on other items.
    async fn exec_item(&self, item: &Self::Item, ctx: ExecContext) -> Result<Self::ItemOutput>;

    /// Called once an item has failed for good. Re-raises by default.
    async fn exec_item_fallback(
        &self,
        _item: &Self::Item,
        error: TutorflowError,
    ) -> Result<Self::ItemOutput> {
        Err(error)
    }

    /// Writes the ordered outputs into the shared state.
    fn post(&self, state: &mut S, items: Vec<Self::Item>, outputs: Vec<Self::ItemOutput>);
}
