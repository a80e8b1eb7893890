//! The four pipeline stages.
//!
//! A stage reads the [`PipelineState`](super::state::PipelineState) and
//! returns a [`StageOutput`]: the one field it owns plus any errors it
//! recovered from. Stages never write the state themselves.

pub mod analyst;
pub mod retriever;
pub mod reviewer;
pub mod summarizer;

use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;

use super::config::PipelineConfig;
use super::message::TokenUsage;
use super::phase::Stage;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::resilient::{Resolution, ResilienceError, RetryPolicy, resilient_call};
use super::state::{Artifact, PipelineState, StageUpdate};
use super::traits::Agent;
use crate::error::PipelineError;
use crate::retrieval::RetrievalGateway;

pub use analyst::AnalystAgent;
pub use reviewer::QaAgent;
pub use summarizer::SummarizerAgent;

/// Shared collaborators for one run.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// Generation gateway.
    pub provider: &'a dyn LlmProvider,
    /// Retrieval gateway.
    pub retrieval: &'a dyn RetrievalGateway,
    /// Pipeline configuration.
    pub config: &'a PipelineConfig,
    /// System prompts.
    pub prompts: &'a PromptSet,
    /// Retry and timeout budget applied to every gateway call.
    pub policy: RetryPolicy,
    /// Cancellation for the run.
    pub cancel: &'a CancellationToken,
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("provider", &self.provider.name())
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// What a stage invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    /// Field the stage owns.
    pub update: StageUpdate,
    /// Errors the stage recovered from, for the stage error log.
    pub errors: Vec<String>,
    /// Tokens consumed by successful generation calls.
    pub usage: TokenUsage,
}

impl StageOutput {
    /// Output without recovered errors or token usage.
    #[must_use]
    pub const fn clean(update: StageUpdate) -> Self {
        Self {
            update,
            errors: Vec::new(),
            usage: TokenUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            },
        }
    }
}

/// Invokes the stage owned by `stage` against the current state.
///
/// # Errors
///
/// Returns the stage's unrecoverable [`PipelineError`].
pub async fn run_stage(
    stage: Stage,
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageOutput, PipelineError> {
    match stage {
        Stage::Retriever => retriever::retrieve(ctx, state).await,
        Stage::Summarizer => summarizer::summarize(ctx, state).await,
        Stage::Analyst => analyst::analyze(ctx, state).await,
        Stage::Qa => reviewer::review(ctx, state).await,
    }
}

/// Generated or substituted text from a generative stage.
#[derive(Debug)]
pub(crate) struct Generation {
    pub artifact: Artifact,
    pub cause: Option<String>,
    pub usage: TokenUsage,
}

impl Generation {
    pub(crate) fn into_output(self, stage: Stage, update: fn(Artifact) -> StageUpdate) -> StageOutput {
        let errors = self
            .cause
            .map(|cause| vec![format!("{stage} generation failed, used fallback: {cause}")])
            .unwrap_or_default();
        StageOutput {
            update: update(self.artifact),
            errors,
            usage: self.usage,
        }
    }
}

/// Runs `agent` through the resilient call, substituting `fallback` output.
///
/// Blank fallback text counts as no output.
pub(crate) async fn generate<F>(
    ctx: &StageContext<'_>,
    stage: Stage,
    agent: &dyn Agent,
    user_msg: &str,
    fallback: F,
) -> Result<Generation, PipelineError>
where
    F: FnOnce() -> String,
{
    let provider = ctx.provider;
    let resolution = resilient_call(
        stage,
        &ctx.policy,
        ctx.cancel,
        || async move {
            agent
                .execute(provider, user_msg)
                .await
                .map(|r| (r.content, r.usage))
        },
        || {
            let text = fallback();
            (!text.trim().is_empty()).then(|| (text, TokenUsage::default()))
        },
    )
    .await;

    match resolution {
        Ok(Resolution::Primary((text, usage))) => Ok(Generation {
            artifact: Artifact::generated(text),
            cause: None,
            usage,
        }),
        Ok(Resolution::Fallback {
            value: (text, _),
            cause,
        }) => Ok(Generation {
            artifact: Artifact::fallback(text),
            cause: Some(cause),
            usage: TokenUsage::default(),
        }),
        Err(e) => Err(escalate(stage, e)),
    }
}

pub(crate) fn escalate(stage: Stage, err: ResilienceError) -> PipelineError {
    match err {
        ResilienceError::Cancelled => PipelineError::Cancelled,
        ResilienceError::FallbackFailed { cause } => PipelineError::FallbackExhausted { stage, cause },
    }
}

/// Truncates `text` to at most `max_chars` characters on a grapheme boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for g in text.graphemes(true) {
        let n = g.chars().count();
        if used + n > max_chars {
            break;
        }
        out.push_str(g);
        used += n;
    }
    out
}
