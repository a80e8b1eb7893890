//! QA stage: writes the cited final answer.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{StageContext, StageOutput, generate};
use crate::agent::config::PipelineConfig;
use crate::agent::phase::Stage;
use crate::agent::prompt::{build_qa_prompt, limited_context_answer};
use crate::agent::state::{PipelineState, Provenance, StageUpdate};
use crate::agent::traits::Agent;
use crate::core::{Passage, render_sources};
use crate::error::PipelineError;

/// Matches citation labels such as `[S3]`.
static CITATION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[S(\d+)\]").ok());

/// Note prefixed to answers assembled without generated analysis.
const DEGRADED_NOTE: &str = "Generated analysis was unavailable for this answer. \
                             The points below are taken directly from the retrieved passages.";

/// Agent that reviews the analysis and writes the user-facing answer.
pub struct QaAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl QaAgent {
    /// Creates a new QA agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &PipelineConfig, system_prompt: String) -> Self {
        Self {
            model: config.qa_model.clone(),
            max_tokens: config.qa_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for QaAgent {
    fn name(&self) -> &'static str {
        "qa"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Returns `true` if `text` contains at least one `[Sn]` label.
#[must_use]
pub fn has_citation(text: &str) -> bool {
    CITATION.as_ref().is_some_and(|re| re.is_match(text))
}

/// Returns `true` if `text` cites a label between `[S1]` and `[S{count}]`.
#[must_use]
pub fn cites_within(text: &str, count: usize) -> bool {
    CITATION.as_ref().is_some_and(|re| {
        re.captures_iter(text)
            .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
            .any(|n| (1..=count).contains(&n))
    })
}

/// Appends the sources block when `answer` cites none of `passages`.
///
/// Labels past the last passage, such as `[S9]` with three passages, do
/// not count as citations.
#[must_use]
pub fn ensure_citations(answer: String, passages: &[Passage]) -> String {
    if passages.is_empty() || cites_within(&answer, passages.len()) {
        return answer;
    }
    format!("{}\n\n{}", answer.trim_end(), render_sources(passages))
}

/// Analysis followed by the sources block.
#[must_use]
pub fn fallback_answer(analysis: &str, analysis_degraded: bool, passages: &[Passage]) -> String {
    let body = if analysis_degraded {
        format!("{DEGRADED_NOTE}\n\n{analysis}")
    } else {
        analysis.to_string()
    };
    format!("{}\n\n{}", body.trim(), render_sources(passages))
}

pub(crate) async fn review(
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageOutput, PipelineError> {
    let passages = state.passages().unwrap_or_default();
    let is_marker = |p: Option<Provenance>| p == Some(Provenance::Marker);
    let upstream_empty = is_marker(state.summary().map(|s| s.provenance))
        && is_marker(state.analysis().map(|a| a.provenance));

    if passages.is_empty() || upstream_empty {
        let retrieval_failed = state.retrieval().is_some_and(|r| r.insufficient_context);
        return Ok(StageOutput::clean(StageUpdate::FinalAnswer(
            limited_context_answer(state.query(), retrieval_failed),
        )));
    }

    let (analysis, degraded) = state
        .analysis()
        .map_or(("", true), |a| (a.text.as_str(), a.is_degraded()));
    let history = state.history();
    let window = &history[history.len().saturating_sub(ctx.config.history_window)..];

    let agent = QaAgent::new(ctx.config, ctx.prompts.qa.clone());
    let user_msg = build_qa_prompt(state.query(), analysis, passages, window);

    let generation = generate(ctx, Stage::Qa, &agent, &user_msg, || {
        fallback_answer(analysis, degraded, passages)
    })
    .await?;

    let mut output = generation.into_output(Stage::Qa, |artifact| {
        StageUpdate::FinalAnswer(artifact.text)
    });
    if let StageUpdate::FinalAnswer(answer) = output.update {
        output.update = StageUpdate::FinalAnswer(ensure_citations(answer, passages));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;
    use test_case::test_case;

    fn passages() -> Vec<Passage> {
        vec![Passage {
            text: "Renewable energy policy.".to_string(),
            locator: "policy.txt#0".to_string(),
            document: DocumentId::new("policy.txt"),
            score: 1.0,
        }]
    }

    #[test_case("see [S1]", true ; "single label")]
    #[test_case("see [S12] and more", true ; "multi digit")]
    #[test_case("see S1", false ; "no brackets")]
    #[test_case("see [S]", false ; "no number")]
    #[test_case("", false ; "empty")]
    fn test_has_citation(text: &str, expected: bool) {
        assert_eq!(has_citation(text), expected);
    }

    #[test]
    fn test_ensure_citations_appends_sources() {
        let answer = ensure_citations("Plain answer.\n".to_string(), &passages());
        assert_eq!(answer, "Plain answer.\n\nSources:\n[S1] policy.txt#0");
    }

    #[test]
    fn test_ensure_citations_keeps_cited_answer() {
        let answer = ensure_citations("Cited [S1].".to_string(), &passages());
        assert_eq!(answer, "Cited [S1].");
        assert_eq!(ensure_citations("x".to_string(), &[]), "x");
    }

    #[test_case("see [S1]", 1, true ; "first label")]
    #[test_case("see [S3] and [S9]", 3, true ; "one label in range")]
    #[test_case("see [S9]", 1, false ; "past last passage")]
    #[test_case("see [S0]", 1, false ; "zero label")]
    #[test_case("see [S1]", 0, false ; "no passages")]
    fn test_cites_within(text: &str, count: usize, expected: bool) {
        assert_eq!(cites_within(text, count), expected);
    }

    #[test]
    fn test_ensure_citations_ignores_out_of_range_label() {
        let answer = ensure_citations("Answer citing [S9].".to_string(), &passages());
        assert_eq!(answer, "Answer citing [S9].\n\nSources:\n[S1] policy.txt#0");
    }

    #[test]
    fn test_fallback_answer() {
        let answer = fallback_answer("- point [S1]", true, &passages());
        assert!(answer.starts_with(DEGRADED_NOTE));
        assert!(answer.ends_with("Sources:\n[S1] policy.txt#0"));
        assert!(has_citation(&answer));

        let clean = fallback_answer("analysis", false, &passages());
        assert!(clean.starts_with("analysis\n\nSources:"));
    }
}
