//! Error types for the tutorflow pipeline.
//!
//! Every failure a stage can raise maps to one of the kinds below. The
//! engine halts on all of them except [`CacheIoError`], which the cache
//! layer downgrades to a warning before it ever reaches a stage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience result alias used across the crate.
pub type Result<T, E = TutorflowError> = std::result::Result<T, E>;

/// The main error type for tutorflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TutorflowError {
    /// A stage input was missing or malformed.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// The generative provider failed.
    #[error("{0}")]
    ExternalService(#[from] ExternalServiceError),

    /// A generative response did not have the expected structure.
    #[error("{0}")]
    ResponseFormat(#[from] ResponseFormatError),

    /// The cache file could not be read or written.
    #[error("{0}")]
    CacheIo(#[from] CacheIoError),

    /// The source repository could not be acquired.
    #[error("{0}")]
    SourceAcquisition(#[from] SourceAcquisitionError),

    /// The tutorial could not be written out.
    #[error("{0}")]
    Emission(#[from] EmissionError),

    /// The pipeline was wired incorrectly.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl TutorflowError {
    /// Short, stable name of the error kind, used in events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::ExternalService(_) => "external_service",
            Self::ResponseFormat(_) => "response_format",
            Self::CacheIo(_) => "cache_io",
            Self::SourceAcquisition(_) => "source_acquisition",
            Self::Emission(_) => "emission",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
        }
    }

    /// Returns true for provider failures.
    #[must_use]
    pub fn is_external_service(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }

    /// Returns true for malformed generative output.
    #[must_use]
    pub fn is_response_format(&self) -> bool {
        matches!(self, Self::ResponseFormat(_))
    }
}

/// Metadata about a wiring error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "FLOW-002-UNKNOWN_SUCCESSOR").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline assembly fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a successor chain loops back on itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        let info = ContractErrorInfo::new(
            "FLOW-004-CYCLE",
            format!("Successor chain loops: {}", err.cycle_path.join(" -> ")),
        )
        .with_fix_hint("A linear flow must end in a stage without a successor.");

        Self {
            message: err.to_string(),
            stages: err.cycle_path,
            error_info: Some(info),
        }
    }
}

/// A stage's required input is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Precondition failed in stage '{stage}': {key} {message}")]
pub struct PreconditionError {
    /// The stage that detected the problem.
    pub stage: String,
    /// The state field that was missing or malformed.
    pub key: String,
    /// What was wrong with it.
    pub message: String,
}

impl PreconditionError {
    /// Creates a new precondition error.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a missing input.
    #[must_use]
    pub fn missing(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(stage, key, "is missing")
    }
}

/// The generative provider failed (transport, auth, or malformed envelope).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Provider '{provider}' failed: {message}")]
pub struct ExternalServiceError {
    /// The provider name.
    pub provider: String,
    /// The failure description.
    pub message: String,
    /// HTTP status code, when the failure came from an HTTP response.
    pub status: Option<u16>,
}

impl ExternalServiceError {
    /// Creates a new external service error.
    #[must_use]
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Sets the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// A generative response could not be parsed into the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed response in stage '{stage}': {message}")]
pub struct ResponseFormatError {
    /// The stage that parsed the response.
    pub stage: String,
    /// What was wrong with the response.
    pub message: String,
}

impl ResponseFormatError {
    /// Creates a new response format error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// The cache file could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cache I/O error at '{path}': {message}")]
pub struct CacheIoError {
    /// The cache file path.
    pub path: String,
    /// The failure description.
    pub message: String,
}

impl CacheIoError {
    /// Creates a new cache I/O error.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The source repository could not be read or yielded no files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to acquire source '{locator}': {message}")]
pub struct SourceAcquisitionError {
    /// The repository locator (path or URL).
    pub locator: String,
    /// The originating cause.
    pub message: String,
}

impl SourceAcquisitionError {
    /// Creates a new source acquisition error.
    #[must_use]
    pub fn new(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

/// The tutorial could not be written to its destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to emit tutorial to '{destination}': {message}")]
pub struct EmissionError {
    /// The output destination.
    pub destination: String,
    /// The originating cause.
    pub message: String,
}

impl EmissionError {
    /// Creates a new emission error.
    #[must_use]
    pub fn new(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            message: message.into(),
        }
    }
}

/// A configuration file or value was invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration in '{origin}': {message}")]
pub struct ConfigError {
    /// Where the value came from (file path or variable name).
    pub origin: String,
    /// What was wrong with it.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_cycle_converts_to_validation_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.code(), Some("FLOW-004-CYCLE"));
        assert_eq!(validation.stages.len(), 3);
    }

    #[test]
    fn test_error_kinds() {
        let err: TutorflowError = ExternalServiceError::new("mock", "boom").into();
        assert_eq!(err.kind(), "external_service");
        assert!(err.is_external_service());
        assert!(!err.is_response_format());

        let err: TutorflowError = ResponseFormatError::new("order", "not yaml").into();
        assert_eq!(err.kind(), "response_format");
        assert!(err.is_response_format());
    }

    #[test]
    fn test_error_messages_carry_cause() {
        let err = SourceAcquisitionError::new("/tmp/nowhere", "no files matched");
        assert_eq!(
            err.to_string(),
            "Failed to acquire source '/tmp/nowhere': no files matched"
        );

        let err = PreconditionError::missing("identify_abstractions", "files");
        assert!(err.to_string().contains("files is missing"));

        let err = ExternalServiceError::new("gemini", "unauthorized").with_status(401);
        assert_eq!(err.status, Some(401));
    }
}
