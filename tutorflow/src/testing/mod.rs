//! Testing utilities for tutorflow pipelines.
//!
//! This module provides:
//! - Scripted and failing generative providers
//! - In-memory source and emitter
//! - Fixture builders producing well-formed answers
//! - Assertions over reports, events and tutorial state

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_event_count, assert_stages_ran, assert_tutorial_consistent};
pub use fixtures::{
    abstraction_name, abstractions_response, chapter_response, order_response, relationships_response,
    sample_abstractions, sample_files, tutorial_provider, CHAPTER_FRAGMENT, IDENTIFY_FRAGMENT, ORDER_FRAGMENT,
    RELATIONSHIPS_FRAGMENT,
};
pub use mocks::{FailingProvider, InMemoryEmitter, InMemorySource, ScriptedProvider};
