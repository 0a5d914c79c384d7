//! # Tutorflow
//!
//! A small stage pipeline engine, and a codebase tutorial generator built
//! on top of it.
//!
//! Tutorflow provides:
//!
//! - **Typed stages**: prep, exec and post phases over a shared state struct
//! - **Retry policies**: bounded attempts with a fixed wait and fallbacks
//! - **Batch stages**: ordered, all-or-nothing fan-out with optional concurrency
//! - **A generative gateway**: one provider, a persistent response cache and a call log
//! - **Event-driven observability**: lifecycle events for every flow and stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tutorflow::prelude::*;
//!
//! let flow = FlowBuilder::new("my-flow")
//!     .stage(FetchStage::new())?
//!     .stage(ProcessStage::new())?
//!     .chain()?
//!     .build()?;
//!
//! let report = flow.run(&mut state).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod config;
pub mod core;
pub mod emit;
pub mod errors;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod source;
pub mod stages;
pub mod testing;
pub mod tutorial;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheStore, InMemoryCache, JsonFileCache};
    pub use crate::config::{LlmSettings, RetrySettings, TutorflowConfig};
    pub use crate::core::{RunReport, StageKind, StagePhase, StageReport};
    pub use crate::emit::{FsEmitter, TutorialDocument, TutorialEmitter};
    pub use crate::errors::{
        ConfigError, ContractErrorInfo, CycleDetectedError, EmissionError, ExternalServiceError,
        PipelineValidationError, PreconditionError, ResponseFormatError, SourceAcquisitionError,
        TutorflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::llm::{CallLog, GenerativeProvider, LlmGateway, ProviderKind};
    pub use crate::pipeline::{Flow, FlowBuilder, RetryPolicy, StageSpec};
    pub use crate::source::{LocalDirSource, SourceAcquirer, SourceFile, SourceFilters};
    pub use crate::stages::{BatchStage, ExecContext, Stage};
    pub use crate::tutorial::{
        build_tutorial_flow, generate_tutorial, TutorialComponents, TutorialRequest, TutorialState,
    };
    pub use crate::utils::{iso_timestamp, Timestamp};
}
