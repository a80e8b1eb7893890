//! The record threaded through the pipeline.
//!
//! Every stage-owned field is write-once. Writers take the state by value
//! and hand back a new state, so a stage has exclusive access for the
//! duration of its invocation and a second write is rejected with
//! [`PipelineError::FieldAlreadySet`] instead of silently overwriting.

use serde::Serialize;

use super::phase::Stage;
use crate::core::{DocumentScope, Passage, Turn};
use crate::error::PipelineError;

/// How a stage artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the generation gateway.
    Generated,
    /// Deterministic substitute after the gateway failed.
    Fallback,
    /// Canned marker for missing upstream content.
    Marker,
}

/// Text output of a stage with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Artifact text.
    pub text: String,
    /// How the text was produced.
    pub provenance: Provenance,
}

impl Artifact {
    /// Artifact produced by the generation gateway.
    #[must_use]
    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Generated,
        }
    }

    /// Deterministic fallback artifact.
    #[must_use]
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Fallback,
        }
    }

    /// Canned marker artifact.
    #[must_use]
    pub fn marker(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Marker,
        }
    }

    /// Returns `true` unless the gateway produced this artifact.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.provenance != Provenance::Generated
    }
}

/// Output of the retriever stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    /// Ranked passages. Empty means nothing relevant was found.
    pub passages: Vec<Passage>,
    /// Set when retrieval failed and the run continued without context.
    pub insufficient_context: bool,
}

/// One entry of the append-only stage error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageErrorRecord {
    /// Stage that recorded the error.
    pub stage: Stage,
    /// Error description.
    pub message: String,
}

/// Field written by one stage invocation.
///
/// Stages read the state and return one of these; only the orchestrator
/// applies it.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    /// Retriever output.
    Retrieval(Retrieval),
    /// Summarizer output.
    Summary(Artifact),
    /// Analyst output.
    Analysis(Artifact),
    /// QA output.
    FinalAnswer(String),
}

/// Mutable-by-replacement state of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    query: String,
    document_scope: DocumentScope,
    conversation_history: Vec<Turn>,
    retrieval: Option<Retrieval>,
    condensed_summary: Option<Artifact>,
    analysis: Option<Artifact>,
    final_answer: Option<String>,
    stage_errors: Vec<StageErrorRecord>,
}

impl PipelineState {
    /// Creates a fresh state for one query submission.
    #[must_use]
    pub fn new(query: impl Into<String>, scope: DocumentScope, history: Vec<Turn>) -> Self {
        Self {
            query: query.into(),
            document_scope: scope,
            conversation_history: history,
            retrieval: None,
            condensed_summary: None,
            analysis: None,
            final_answer: None,
            stage_errors: Vec::new(),
        }
    }

    /// The user's question.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Documents this run may retrieve from.
    #[must_use]
    pub const fn scope(&self) -> &DocumentScope {
        &self.document_scope
    }

    /// Prior conversation turns.
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.conversation_history
    }

    /// Retriever output, or `None` if the retriever has not run.
    #[must_use]
    pub const fn retrieval(&self) -> Option<&Retrieval> {
        self.retrieval.as_ref()
    }

    /// Retrieved passages, or `None` if the retriever has not run.
    #[must_use]
    pub fn passages(&self) -> Option<&[Passage]> {
        self.retrieval.as_ref().map(|r| r.passages.as_slice())
    }

    /// Condensed summary, if set.
    #[must_use]
    pub const fn summary(&self) -> Option<&Artifact> {
        self.condensed_summary.as_ref()
    }

    /// Analysis, if set.
    #[must_use]
    pub const fn analysis(&self) -> Option<&Artifact> {
        self.analysis.as_ref()
    }

    /// Final answer, if set.
    #[must_use]
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Errors recorded so far, in order.
    #[must_use]
    pub fn stage_errors(&self) -> &[StageErrorRecord] {
        &self.stage_errors
    }

    /// Errors recorded by `stage`.
    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &StageErrorRecord> {
        self.stage_errors.iter().filter(move |e| e.stage == stage)
    }

    /// Sets the retriever output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FieldAlreadySet`] on a second write.
    pub fn with_retrieval(self, retrieval: Retrieval) -> Result<Self, PipelineError> {
        self.with_update(StageUpdate::Retrieval(retrieval))
    }

    /// Sets the condensed summary.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FieldAlreadySet`] on a second write.
    pub fn with_summary(self, summary: Artifact) -> Result<Self, PipelineError> {
        self.with_update(StageUpdate::Summary(summary))
    }

    /// Sets the analysis.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FieldAlreadySet`] on a second write.
    pub fn with_analysis(self, analysis: Artifact) -> Result<Self, PipelineError> {
        self.with_update(StageUpdate::Analysis(analysis))
    }

    /// Sets the final answer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FieldAlreadySet`] on a second write.
    pub fn with_final_answer(self, answer: String) -> Result<Self, PipelineError> {
        self.with_update(StageUpdate::FinalAnswer(answer))
    }

    /// Applies a stage's update, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FieldAlreadySet`] if the target field is set.
    pub fn with_update(mut self, update: StageUpdate) -> Result<Self, PipelineError> {
        self.apply(update)?;
        Ok(self)
    }

    /// In-place form of [`with_update`](Self::with_update).
    ///
    /// A rejected write leaves the state untouched, so the orchestrator can
    /// still hand the partial record back on failure.
    pub(crate) fn apply(&mut self, update: StageUpdate) -> Result<(), PipelineError> {
        match update {
            StageUpdate::Retrieval(r) => write_once(&mut self.retrieval, r, "retrieved_passages"),
            StageUpdate::Summary(a) => write_once(&mut self.condensed_summary, a, "condensed_summary"),
            StageUpdate::Analysis(a) => write_once(&mut self.analysis, a, "analysis"),
            StageUpdate::FinalAnswer(s) => write_once(&mut self.final_answer, s, "final_answer"),
        }
    }

    pub(crate) fn record_error(&mut self, stage: Stage, message: String) {
        self.stage_errors.push(StageErrorRecord { stage, message });
    }

    /// Appends to the stage error log.
    #[must_use]
    pub fn with_error(mut self, stage: Stage, message: impl Into<String>) -> Self {
        self.record_error(stage, message.into());
        self
    }

    /// History extended with this run's exchange.
    ///
    /// Only the orchestrator calls this, once the run has completed.
    pub(crate) fn finalized_history(&self) -> Vec<Turn> {
        let mut history = self.conversation_history.clone();
        history.push(Turn::user(self.query.clone()));
        if let Some(answer) = &self.final_answer {
            history.push(Turn::assistant(answer.clone()));
        }
        history
    }
}

fn write_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::FieldAlreadySet {
            field: field.to_string(),
        });
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;

    fn state() -> PipelineState {
        PipelineState::new(
            "What is the main topic?",
            DocumentScope::single(DocumentId::new("doc.txt")),
            vec![Turn::user("earlier")],
        )
    }

    #[test]
    fn test_not_run_is_distinct_from_empty() {
        let fresh = state();
        assert!(fresh.passages().is_none());

        let retrieved = fresh
            .with_retrieval(Retrieval {
                passages: Vec::new(),
                insufficient_context: false,
            })
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(retrieved.passages().map(<[Passage]>::len), Some(0));
    }

    #[test]
    fn test_second_write_rejected() {
        let state = state()
            .with_summary(Artifact::generated("first"))
            .unwrap_or_else(|_| unreachable!());
        let err = state.with_summary(Artifact::generated("second"));
        assert_eq!(
            err.err(),
            Some(PipelineError::FieldAlreadySet {
                field: "condensed_summary".to_string()
            })
        );
    }

    #[test]
    fn test_final_answer_write_once() {
        let state = state()
            .with_final_answer("answer".to_string())
            .unwrap_or_else(|_| unreachable!());
        assert!(state.clone().with_final_answer("again".to_string()).is_err());
        assert_eq!(state.final_answer(), Some("answer"));
    }

    #[test]
    fn test_rejected_apply_keeps_state() {
        let mut state = state()
            .with_analysis(Artifact::fallback("kept"))
            .unwrap_or_else(|_| unreachable!());
        let result = state.apply(StageUpdate::Analysis(Artifact::generated("other")));
        assert!(result.is_err());
        assert_eq!(state.analysis().map(|a| a.text.as_str()), Some("kept"));
    }

    #[test]
    fn test_error_log_is_append_only() {
        let state = state()
            .with_error(Stage::Summarizer, "first")
            .with_error(Stage::Analyst, "second")
            .with_error(Stage::Summarizer, "third");
        assert_eq!(state.stage_errors().len(), 3);
        assert_eq!(state.errors_for(Stage::Summarizer).count(), 2);
        assert_eq!(state.stage_errors()[1].message, "second");
    }

    #[test]
    fn test_finalized_history_appends_exchange() {
        let state = state()
            .with_final_answer("It is about energy.".to_string())
            .unwrap_or_else(|_| unreachable!());
        let history = state.finalized_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Turn::user("What is the main topic?"));
        assert_eq!(history[2], Turn::assistant("It is about energy."));
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_artifact_degraded() {
        assert!(!Artifact::generated("x").is_degraded());
        assert!(Artifact::fallback("x").is_degraded());
        assert!(Artifact::marker("x").is_degraded());
    }
}
