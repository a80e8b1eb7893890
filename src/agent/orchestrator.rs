//! Orchestrator for the staged question-answering pipeline.
//!
//! Drives one run through the linear phase graph: retrieve → summarize →
//! analyze → review. Each phase invokes exactly one stage on the current
//! [`PipelineState`]; stage-local recovery keeps the run alive and only
//! an escalated [`PipelineError`] moves it to `Failed`.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::digest::{Digest, digest_document};
use super::message::TokenUsage;
use super::outcome::{PipelineOutcome, RunStatus};
use super::phase::{Phase, Stage};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::resilient::RetryPolicy;
use super::stages::retriever::validate_scope;
use super::stages::{StageContext, run_stage};
use super::state::PipelineState;
use crate::core::{DocumentId, DocumentScope, Turn};
use crate::error::PipelineError;
use crate::retrieval::RetrievalGateway;

/// Orchestrates single pipeline runs.
///
/// Holds only shared, read-only collaborators, so one orchestrator can
/// serve any number of concurrent runs.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    retrieval: Arc<dyn RetrievalGateway>,
    config: PipelineConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates a new orchestrator with the given gateways and configuration.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`PipelineConfig::prompt_dir`], falling back to compiled-in defaults.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        retrieval: Arc<dyn RetrievalGateway>,
        config: PipelineConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            retrieval,
            config,
            prompts,
        }
    }

    /// Replaces the system prompts.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn context<'a>(&'a self, cancel: &'a CancellationToken) -> StageContext<'a> {
        StageContext {
            provider: self.provider.as_ref(),
            retrieval: self.retrieval.as_ref(),
            config: &self.config,
            prompts: &self.prompts,
            policy: RetryPolicy::from_config(&self.config),
            cancel,
        }
    }

    /// Runs the pipeline for `query` over `scope`.
    pub async fn run(&self, query: &str, scope: DocumentScope, history: Vec<Turn>) -> PipelineOutcome {
        self.run_with_cancel(query, scope, history, &CancellationToken::new())
            .await
    }

    /// Runs the pipeline, stopping at the next suspension point once
    /// `cancel` fires.
    ///
    /// Never returns an error: failures are reported through
    /// [`PipelineOutcome::status`] together with the stage error log.
    pub async fn run_with_cancel(
        &self,
        query: &str,
        scope: DocumentScope,
        history: Vec<Turn>,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let start = Instant::now();
        let ctx = self.context(cancel);
        let mut state = PipelineState::new(query, scope, history);
        let mut trace = vec![Phase::Created];
        let mut usage = TokenUsage::default();

        debug!(scope = %state.scope(), query_len = query.len(), "pipeline run started");

        let result = match validate_scope(ctx.retrieval, state.scope()) {
            Ok(()) => drive(&ctx, &mut state, &mut trace, &mut usage).await,
            Err(e) => Err((Stage::Retriever, e)),
        };
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                info!(
                    elapsed_ms,
                    stage_errors = state.stage_errors().len(),
                    total_tokens = usage.total_tokens,
                    "pipeline completed"
                );
                PipelineOutcome {
                    status: RunStatus::Completed,
                    final_answer: state.final_answer().map(str::to_string),
                    failure: None,
                    stage_errors: state.stage_errors().to_vec(),
                    history: state.finalized_history(),
                    state: Some(state),
                    trace,
                    usage,
                    elapsed_ms,
                }
            }
            Err((stage, error)) => {
                state.record_error(stage, error.to_string());
                if let Some(&last) = trace.last() {
                    trace.push(last.fail());
                }
                warn!(%stage, reason = error.reason(), error = %error, "pipeline failed");
                let keep_state = error != PipelineError::Cancelled;
                PipelineOutcome {
                    status: RunStatus::Failed,
                    final_answer: None,
                    failure: Some(error),
                    stage_errors: state.stage_errors().to_vec(),
                    history: state.history().to_vec(),
                    state: keep_state.then_some(state),
                    trace,
                    usage,
                    elapsed_ms,
                }
            }
        }
    }

    /// Generates an overview of a single indexed document.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyScope`] for an unknown document,
    /// [`PipelineError::Cancelled`] on cancellation and
    /// [`PipelineError::FallbackExhausted`] if nothing could be produced.
    pub async fn digest(
        &self,
        document: &DocumentId,
        cancel: &CancellationToken,
    ) -> Result<Digest, PipelineError> {
        digest_document(&self.context(cancel), document).await
    }
}

/// Advances the phase machine from `Created` until a terminal phase.
async fn drive(
    ctx: &StageContext<'_>,
    state: &mut PipelineState,
    trace: &mut Vec<Phase>,
    usage: &mut TokenUsage,
) -> Result<(), (Stage, PipelineError)> {
    let mut phase = Phase::Created;
    loop {
        phase = phase.next();
        let Some(stage) = phase.stage() else {
            return complete(state, trace, phase);
        };
        trace.push(phase);

        debug!(%stage, ?phase, "stage started");
        let output = run_stage(stage, ctx, state).await.map_err(|e| (stage, e))?;
        if !output.errors.is_empty() {
            debug!(%stage, recovered = output.errors.len(), "stage degraded");
        }
        for message in output.errors {
            state.record_error(stage, message);
        }
        usage.accumulate(output.usage);
        state.apply(output.update).map_err(|e| (stage, e))?;
    }
}

/// Enters the terminal `phase` only once a non-blank answer exists.
///
/// On a blank answer the trace still ends in the QA phase, so the failure
/// path records `Failed` after it.
fn complete(
    state: &PipelineState,
    trace: &mut Vec<Phase>,
    phase: Phase,
) -> Result<(), (Stage, PipelineError)> {
    if state.final_answer().is_none_or(|a| a.trim().is_empty()) {
        return Err((
            Stage::Qa,
            PipelineError::FallbackExhausted {
                stage: Stage::Qa,
                cause: "final answer is empty".to_string(),
            },
        ));
    }
    trace.push(phase);
    Ok(())
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}
