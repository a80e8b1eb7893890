//! Retriever stage: ranked passages for the query within the run's scope.

use tracing::debug;

use super::{StageContext, StageOutput, escalate};
use crate::agent::phase::Stage;
use crate::agent::resilient::{Resolution, ResilienceError, resilient_call};
use crate::agent::state::{PipelineState, Retrieval, StageUpdate};
use crate::core::{DocumentScope, Passage};
use crate::error::PipelineError;
use crate::retrieval::RetrievalGateway;

/// Checks that `scope` names at least one indexed document.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyScope`] otherwise.
pub fn validate_scope(
    retrieval: &dyn RetrievalGateway,
    scope: &DocumentScope,
) -> Result<(), PipelineError> {
    if scope.documents().iter().any(|d| retrieval.is_indexed(d)) {
        Ok(())
    } else {
        Err(PipelineError::EmptyScope {
            scope: scope.to_string(),
        })
    }
}

/// Ranks by descending score. Equal scores keep gateway order.
fn rank(mut passages: Vec<Passage>, k: usize) -> Vec<Passage> {
    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
    passages.truncate(k);
    passages
}

pub(crate) async fn retrieve(
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageOutput, PipelineError> {
    validate_scope(ctx.retrieval, state.scope())?;

    let k = ctx.config.top_k;
    let fallback_enabled = ctx.config.fallback_enabled;
    let retrieval = ctx.retrieval;
    let query = state.query();
    let scope = state.scope();

    let resolution = resilient_call(
        Stage::Retriever,
        &ctx.policy,
        ctx.cancel,
        || retrieval.search(query, scope, k),
        || fallback_enabled.then(Vec::new),
    )
    .await;

    match resolution {
        Ok(Resolution::Primary(passages)) => {
            let passages = rank(passages, k);
            debug!(count = passages.len(), %scope, "passages retrieved");
            Ok(StageOutput::clean(StageUpdate::Retrieval(Retrieval {
                passages,
                insufficient_context: false,
            })))
        }
        Ok(Resolution::Fallback { value, cause }) => Ok(StageOutput {
            update: StageUpdate::Retrieval(Retrieval {
                passages: value,
                insufficient_context: true,
            }),
            errors: vec![format!(
                "retrieval unavailable, continuing with insufficient context: {cause}"
            )],
            usage: crate::agent::message::TokenUsage::default(),
        }),
        Err(ResilienceError::FallbackFailed { cause }) => {
            Err(PipelineError::RetrievalUnavailable { message: cause })
        }
        Err(e) => Err(escalate(Stage::Retriever, e)),
    }
}
