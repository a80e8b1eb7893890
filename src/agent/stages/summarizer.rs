//! Summarizer stage: condenses retrieved passages.
//!
//! The summary is built only from `retrieved_passages`. Passage labels
//! (`[S1]`, ...) are kept in the text so later stages can still attribute
//! statements to their sources.

use async_trait::async_trait;

use super::{StageContext, StageOutput, generate, truncate_chars};
use crate::agent::config::PipelineConfig;
use crate::agent::phase::Stage;
use crate::agent::prompt::{NO_CONTENT_SUMMARY, build_summarizer_prompt};
use crate::agent::state::{Artifact, PipelineState, StageUpdate};
use crate::agent::traits::Agent;
use crate::core::{Passage, citation_label};
use crate::error::PipelineError;

/// Agent that condenses passages into a bounded summary.
pub struct SummarizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl SummarizerAgent {
    /// Creates a new summarizer agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &PipelineConfig, system_prompt: String) -> Self {
        Self {
            model: config.summarizer_model.clone(),
            max_tokens: config.summarizer_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SummarizerAgent {
    fn name(&self) -> &'static str {
        "summarizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Labelled concatenation of the passages, bounded to `max_chars`.
#[must_use]
pub fn fallback_summary(passages: &[Passage], max_chars: usize) -> String {
    let joined = passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", citation_label(i), p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, max_chars)
}

pub(crate) async fn summarize(
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageOutput, PipelineError> {
    let passages = state.passages().unwrap_or_default();
    if passages.is_empty() {
        return Ok(StageOutput::clean(StageUpdate::Summary(Artifact::marker(
            NO_CONTENT_SUMMARY,
        ))));
    }

    let max_chars = ctx.config.summary_max_chars;
    let agent = SummarizerAgent::new(ctx.config, ctx.prompts.summarizer.clone());
    let user_msg = build_summarizer_prompt(state.query(), passages, max_chars);

    let mut generation = generate(ctx, Stage::Summarizer, &agent, &user_msg, || {
        fallback_summary(passages, max_chars)
    })
    .await?;
    generation.artifact.text = truncate_chars(&generation.artifact.text, max_chars);

    Ok(generation.into_output(Stage::Summarizer, StageUpdate::Summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;

    fn passages() -> Vec<Passage> {
        ["  First passage. ", "Second passage."]
            .iter()
            .enumerate()
            .map(|(i, text)| Passage {
                text: (*text).to_string(),
                locator: format!("doc#{i}"),
                document: DocumentId::new("doc"),
                score: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_fallback_summary_is_labelled() {
        let summary = fallback_summary(&passages(), 1000);
        assert_eq!(summary, "[S1] First passage.\n\n[S2] Second passage.");
    }

    #[test]
    fn test_fallback_summary_is_bounded() {
        let summary = fallback_summary(&passages(), 10);
        assert_eq!(summary.chars().count(), 10);
        assert!(summary.starts_with("[S1] First"));
    }

    #[test]
    fn test_fallback_summary_empty() {
        assert!(fallback_summary(&[], 100).is_empty());
    }

    #[test]
    fn test_agent_properties() {
        let config = PipelineConfig::builder()
            .summarizer_model("small")
            .summarizer_max_tokens(512)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = SummarizerAgent::new(&config, "prompt".to_string());
        assert_eq!(agent.name(), "summarizer");
        assert_eq!(agent.model(), "small");
        assert_eq!(agent.max_tokens(), 512);
        assert_eq!(agent.system_prompt(), "prompt");
    }
}
