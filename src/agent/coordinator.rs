//! Multi-document coordination.
//!
//! A [`RunMode`] turns the caller's document selection into one or more
//! scopes; every scope then goes through the same single-pipeline run.
//! Independent runs execute concurrently, bounded by
//! [`PipelineConfig::max_concurrency`](super::PipelineConfig::max_concurrency),
//! and one run failing never affects its siblings.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::message::TokenUsage;
use super::orchestrator::Orchestrator;
use super::outcome::{PipelineOutcome, RunStatus};
use crate::core::{DocumentId, DocumentScope, Turn};
use crate::error::PipelineError;

/// How a multi-document selection becomes pipeline scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One run per document.
    #[default]
    Independent,
    /// One run over a scope spanning every document.
    Comparative,
}

impl RunMode {
    /// Scopes to run for `documents`, in selection order.
    #[must_use]
    pub fn scopes(self, documents: &[DocumentId]) -> Vec<DocumentScope> {
        match self {
            Self::Independent => documents
                .iter()
                .cloned()
                .map(DocumentScope::single)
                .collect(),
            Self::Comparative => vec![documents.iter().cloned().collect()],
        }
    }
}

/// Outcome of the run for one scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeResult {
    /// Scope the run covered.
    pub scope: DocumentScope,
    /// Run outcome.
    pub outcome: PipelineOutcome,
}

/// Per-scope results of a multi-document query, in selection order.
#[derive(Debug, Clone, Serialize)]
pub struct MultiOutcome {
    /// Mode the query ran in.
    pub mode: RunMode,
    /// One entry per scope.
    pub results: Vec<ScopeResult>,
}

impl MultiOutcome {
    /// Outcome for `scope`, if it was run.
    #[must_use]
    pub fn get(&self, scope: &DocumentScope) -> Option<&PipelineOutcome> {
        self.results
            .iter()
            .find(|r| &r.scope == scope)
            .map(|r| &r.outcome)
    }

    /// Number of completed runs.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_completed())
            .count()
    }

    /// Returns `true` if every run completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.completed_count() == self.results.len()
    }
}

/// Fans one query out across document scopes.
#[derive(Debug, Clone)]
pub struct Coordinator {
    orchestrator: Arc<Orchestrator>,
}

impl Coordinator {
    /// Creates a coordinator sharing `orchestrator` across runs.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Runs `query` over `documents` in the given mode.
    ///
    /// Each run gets a child of `cancel`, so cancelling the parent stops
    /// every in-flight run at its next suspension point.
    pub async fn run_many(
        &self,
        query: &str,
        documents: &[DocumentId],
        mode: RunMode,
        history: &[Turn],
        cancel: &CancellationToken,
    ) -> MultiOutcome {
        let scopes = mode.scopes(documents);
        let semaphore = Arc::new(Semaphore::new(self.orchestrator.config().max_concurrency));
        debug!(?mode, runs = scopes.len(), "multi-document query started");

        let mut handles = Vec::with_capacity(scopes.len());
        for scope in &scopes {
            let sem = Arc::clone(&semaphore);
            let orchestrator = Arc::clone(&self.orchestrator);
            let token = cancel.child_token();
            let query = query.to_string();
            let history = history.to_vec();
            let scope = scope.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();
                orchestrator
                    .run_with_cancel(&query, scope, history, &token)
                    .await
            }));
        }

        let results = scopes
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(scope, joined)| {
                let outcome = joined.unwrap_or_else(|e| aborted_outcome(history, &e.to_string()));
                ScopeResult { scope, outcome }
            })
            .collect();

        MultiOutcome { mode, results }
    }
}

fn aborted_outcome(history: &[Turn], message: &str) -> PipelineOutcome {
    PipelineOutcome {
        status: RunStatus::Failed,
        final_answer: None,
        failure: Some(PipelineError::Aborted {
            message: message.to_string(),
        }),
        stage_errors: Vec::new(),
        state: None,
        history: history.to_vec(),
        trace: Vec::new(),
        usage: TokenUsage::default(),
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DocumentId> {
        names.iter().copied().map(DocumentId::from).collect()
    }

    #[test]
    fn test_independent_scopes_keep_selection_order() {
        let scopes = RunMode::Independent.scopes(&ids(&["b.txt", "a.txt"]));
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0], DocumentScope::single(DocumentId::new("b.txt")));
        assert_eq!(scopes[1], DocumentScope::single(DocumentId::new("a.txt")));
    }

    #[test]
    fn test_comparative_single_merged_scope() {
        let scopes = RunMode::Comparative.scopes(&ids(&["a.txt", "b.txt"]));
        assert_eq!(scopes.len(), 1);
        assert!(scopes[0].is_multi_document());
        assert_eq!(scopes[0].documents(), ids(&["a.txt", "b.txt"]).as_slice());
    }

    #[test]
    fn test_aborted_outcome_is_failed() {
        let outcome = aborted_outcome(&[], "task panicked");
        assert!(!outcome.is_completed());
        assert_eq!(outcome.reason(), Some("AbortedError"));
    }
}
