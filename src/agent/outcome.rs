//! Result of one pipeline run.

use std::fmt::Write;

use serde::Serialize;

use super::message::TokenUsage;
use super::phase::Phase;
use super::state::{PipelineState, StageErrorRecord};
use crate::core::Turn;
use crate::error::PipelineError;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A final answer was produced.
    Completed,
    /// The run stopped on an unrecoverable error.
    Failed,
}

/// Everything a caller needs to present a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Terminal status.
    pub status: RunStatus,
    /// User-visible answer. Always non-empty when `status` is `Completed`.
    pub final_answer: Option<String>,
    /// Why the run failed, when it did.
    pub failure: Option<PipelineError>,
    /// Stage error log of the run.
    pub stage_errors: Vec<StageErrorRecord>,
    /// Final or partial state. `None` when the run was cancelled.
    pub state: Option<PipelineState>,
    /// Conversation history to carry into the next run.
    ///
    /// Extended with this exchange only on completion.
    pub history: Vec<Turn>,
    /// Phases visited, in order.
    pub trace: Vec<Phase>,
    /// Tokens used by successful generation calls.
    pub usage: TokenUsage,
    /// Wall time of the run in milliseconds.
    pub elapsed_ms: u64,
}

impl PipelineOutcome {
    /// Returns `true` for completed runs.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Failure class name (e.g. `"EmptyScopeError"`), if the run failed.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        self.failure.as_ref().map(PipelineError::reason)
    }

    /// Text to show the user: the answer, or the failure and its causes.
    #[must_use]
    pub fn display_text(&self) -> String {
        if let Some(answer) = &self.final_answer
            && self.is_completed()
        {
            return answer.clone();
        }
        let mut text = self.failure.as_ref().map_or_else(
            || "The run failed.".to_string(),
            |e| format!("{}: {e}", e.reason()),
        );
        for record in &self.stage_errors {
            let _ = write!(text, "\n  - {}: {}", record.stage, record.message);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::phase::Stage;

    fn failed() -> PipelineOutcome {
        PipelineOutcome {
            status: RunStatus::Failed,
            final_answer: None,
            failure: Some(PipelineError::EmptyScope {
                scope: "[]".to_string(),
            }),
            stage_errors: vec![StageErrorRecord {
                stage: Stage::Retriever,
                message: "no indexed document".to_string(),
            }],
            state: None,
            history: Vec::new(),
            trace: vec![Phase::Created, Phase::Failed],
            usage: TokenUsage::default(),
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_failed_display_lists_errors() {
        let outcome = failed();
        assert_eq!(outcome.reason(), Some("EmptyScopeError"));
        let text = outcome.display_text();
        assert!(text.starts_with("EmptyScopeError:"));
        assert!(text.contains("retriever: no indexed document"));
    }

    #[test]
    fn test_serializes_status_snake_case() {
        let json = serde_json::to_value(failed()).unwrap_or_default();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure"]["kind"], "empty_scope");
        assert_eq!(json["trace"][1], "failed");
    }
}
