//! Pipeline stages and the run state machine.
//!
//! The graph is strictly linear:
//!
//! ```text
//! Created → Retrieving → Summarizing → Analyzing → ReviewingQa → Completed
//!     \__________\____________\____________\____________\→ Failed
//! ```
//!
//! [`Phase::next`] is total over every phase, so the orchestrator cannot
//! skip or revisit a stage. Terminal phases map to themselves.

use serde::{Deserialize, Serialize};

/// One transformation step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetches ranked passages.
    Retriever,
    /// Condenses passages into a summary.
    Summarizer,
    /// Elaborates concepts and relationships.
    Analyst,
    /// Produces the cited final answer.
    Qa,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Retriever, Self::Summarizer, Self::Analyst, Self::Qa];

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retriever => "retriever",
            Self::Summarizer => "summarizer",
            Self::Analyst => "analyst",
            Self::Qa => "qa",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// State allocated, nothing invoked.
    Created,
    /// Retriever stage running.
    Retrieving,
    /// Summarizer stage running.
    Summarizing,
    /// Analyst stage running.
    Analyzing,
    /// QA stage running.
    ReviewingQa,
    /// Final answer produced.
    Completed,
    /// Unrecoverable error.
    Failed,
}

impl Phase {
    /// Successor on success. Terminal phases are fixed points.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Created => Self::Retrieving,
            Self::Retrieving => Self::Summarizing,
            Self::Summarizing => Self::Analyzing,
            Self::Analyzing => Self::ReviewingQa,
            Self::ReviewingQa => Self::Completed,
            Self::Completed => Self::Completed,
            Self::Failed => Self::Failed,
        }
    }

    /// Successor on an unrecoverable error.
    #[must_use]
    pub const fn fail(self) -> Self {
        match self {
            Self::Completed => Self::Completed,
            _ => Self::Failed,
        }
    }

    /// Stage invoked while in this phase, if any.
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Retrieving => Some(Stage::Retriever),
            Self::Summarizing => Some(Stage::Summarizer),
            Self::Analyzing => Some(Stage::Analyst),
            Self::ReviewingQa => Some(Stage::Qa),
            Self::Created | Self::Completed | Self::Failed => None,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
