//! Core domain model types for tutorflow.
//!
//! This module contains the fundamental types shared by the engine:
//! - Stage lifecycle phases and stage kinds
//! - Per-stage and per-run execution reports

mod report;
mod status;

pub use report::{RunReport, StageReport};
pub use status::{StageKind, StagePhase};
