//! Error types for docent.
//!
//! Gateway errors ([`GenerationError`], [`RetrievalError`]) are transient and
//! recovered inside a stage. [`PipelineError`] is what escalates a run to
//! `Failed`. [`ConfigError`] and [`CommandError`] cover setup and the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::phase::Stage;

/// Result alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the binary and command layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pipeline run failed before producing an answer.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A CLI command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the generation gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The provider rejected the call due to rate limiting.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Provider message.
        message: String,
    },

    /// The call did not finish within the stage timeout.
    #[error("generation timed out after {after:?}")]
    Timeout {
        /// Elapsed budget.
        after: Duration,
    },

    /// Any other provider or transport failure.
    #[error("provider error: {message}")]
    Provider {
        /// Provider message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The provider answered with no text.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Failure of the retrieval gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// The index could not be reached.
    #[error("retrieval unavailable: {message}")]
    Unavailable {
        /// Transport or backend message.
        message: String,
    },

    /// The search did not finish within the stage timeout.
    #[error("retrieval timed out after {after:?}")]
    Timeout {
        /// Elapsed budget.
        after: Duration,
    },
}

/// Errors that move a pipeline run to `Failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    /// The scope references no indexed document.
    #[error("empty scope: no indexed documents in {scope}")]
    EmptyScope {
        /// Display form of the requested scope.
        scope: String,
    },

    /// Retrieval failed after retries and no fallback was allowed.
    #[error("retrieval unavailable: {message}")]
    RetrievalUnavailable {
        /// Last gateway error.
        message: String,
    },

    /// A stage's deterministic fallback produced nothing usable.
    #[error("{stage} fallback exhausted: {cause}")]
    FallbackExhausted {
        /// Stage whose fallback failed.
        stage: Stage,
        /// Gateway error that triggered the fallback.
        cause: String,
    },

    /// A stage tried to overwrite a field that was already set.
    #[error("write-once violation: field `{field}` already set")]
    FieldAlreadySet {
        /// Name of the state field.
        field: String,
    },

    /// The run was cancelled at a suspension point.
    #[error("run cancelled")]
    Cancelled,

    /// The task driving the run ended without reporting an outcome.
    #[error("run aborted: {message}")]
    Aborted {
        /// Join failure description.
        message: String,
    },
}

impl PipelineError {
    /// Short machine-readable reason, used in CLI output.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::EmptyScope { .. } => "EmptyScopeError",
            Self::RetrievalUnavailable { .. } => "RetrievalUnavailableError",
            Self::FallbackExhausted { .. } => "FallbackExhaustedError",
            Self::FieldAlreadySet { .. } => "WriteOnceViolation",
            Self::Cancelled => "CancelledError",
            Self::Aborted { .. } => "AbortedError",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key was configured for a provider that needs one.
    #[error("API key missing: set OPENAI_API_KEY or DOCENT_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is unknown.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider.
        name: String,
    },

    /// A value failed validation.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_reason() {
        let err = PipelineError::EmptyScope {
            scope: "[]".to_string(),
        };
        assert_eq!(err.reason(), "EmptyScopeError");
        assert_eq!(PipelineError::Cancelled.reason(), "CancelledError");
    }

    #[test]
    fn test_pipeline_error_serialization() {
        let err = PipelineError::FallbackExhausted {
            stage: Stage::Summarizer,
            cause: "provider error: boom".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap_or_default();
        assert!(json.contains("\"kind\":\"fallback_exhausted\""));
        assert!(json.contains("\"stage\":\"summarizer\""));
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Timeout {
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "generation timed out after 2s");
    }
}
