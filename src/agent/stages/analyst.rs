//! Analyst stage: key concepts, relationships and cross-document comparison.

use std::fmt::Write;

use async_trait::async_trait;

use super::{StageContext, StageOutput, generate, truncate_chars};
use crate::agent::config::PipelineConfig;
use crate::agent::phase::Stage;
use crate::agent::prompt::{NO_BASIS_ANALYSIS, build_analyst_prompt};
use crate::agent::state::{Artifact, PipelineState, Provenance, StageUpdate};
use crate::agent::traits::Agent;
use crate::core::{DocumentId, Passage, citation_label};
use crate::error::PipelineError;

/// Longest key point taken from a single passage.
const KEY_POINT_MAX_CHARS: usize = 240;

/// Agent that elaborates the summary into a structured analysis.
pub struct AnalystAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl AnalystAgent {
    /// Creates a new analyst agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &PipelineConfig, system_prompt: String) -> Self {
        Self {
            model: config.analyst_model.clone(),
            max_tokens: config.analyst_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for AnalystAgent {
    fn name(&self) -> &'static str {
        "analyst"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// First sentence of `text`, or its first line when there is no terminator.
fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let line = text.lines().next().unwrap_or_default();
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace())
        {
            return &line[..i + c.len_utf8()];
        }
    }
    line
}

/// One key-point line per passage, grouped by document for multi-document scopes.
#[must_use]
pub fn fallback_analysis(passages: &[Passage], multi_document: bool) -> String {
    let point = |i: usize, p: &Passage| {
        format!(
            "- {} {}",
            truncate_chars(first_sentence(&p.text), KEY_POINT_MAX_CHARS),
            citation_label(i)
        )
    };

    let mut out = String::from("Key points from the retrieved passages:\n");
    if multi_document {
        let mut order: Vec<&DocumentId> = Vec::new();
        for p in passages {
            if !order.contains(&&p.document) {
                order.push(&p.document);
            }
        }
        for doc in order {
            let _ = write!(out, "\n{doc}:\n");
            for (i, p) in passages.iter().enumerate().filter(|(_, p)| &p.document == doc) {
                out.push_str(&point(i, p));
                out.push('\n');
            }
        }
    } else {
        for (i, p) in passages.iter().enumerate() {
            out.push_str(&point(i, p));
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

pub(crate) async fn analyze(
    ctx: &StageContext<'_>,
    state: &PipelineState,
) -> Result<StageOutput, PipelineError> {
    let passages = state.passages().unwrap_or_default();
    let summary = state
        .summary()
        .filter(|s| s.provenance != Provenance::Marker);
    let Some(summary) = summary.filter(|_| !passages.is_empty()) else {
        return Ok(StageOutput::clean(StageUpdate::Analysis(Artifact::marker(
            NO_BASIS_ANALYSIS,
        ))));
    };

    let multi_document = state.scope().is_multi_document();
    let agent = AnalystAgent::new(ctx.config, ctx.prompts.analyst.clone());
    let user_msg = build_analyst_prompt(state.query(), &summary.text, passages, multi_document);

    let generation = generate(ctx, Stage::Analyst, &agent, &user_msg, || {
        fallback_analysis(passages, multi_document)
    })
    .await?;

    Ok(generation.into_output(Stage::Analyst, StageUpdate::Analysis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(doc: &str, text: &str) -> Passage {
        Passage {
            text: text.to_string(),
            locator: format!("{doc}#0"),
            document: DocumentId::new(doc),
            score: 1.0,
        }
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two."), "One.");
        assert_eq!(first_sentence("Version 1.2 is out! Next"), "Version 1.2 is out!");
        assert_eq!(first_sentence("no terminator\nsecond line"), "no terminator");
        assert_eq!(first_sentence("   "), "");
    }

    #[test]
    fn test_fallback_single_document() {
        let passages = vec![
            passage("a.txt", "Solar grew fast. It doubled."),
            passage("a.txt", "Wind is cheap."),
        ];
        let analysis = fallback_analysis(&passages, false);
        assert_eq!(
            analysis,
            "Key points from the retrieved passages:\n- Solar grew fast. [S1]\n- Wind is cheap. [S2]"
        );
    }

    #[test]
    fn test_fallback_groups_by_document() {
        let passages = vec![
            passage("a.txt", "Alpha one."),
            passage("b.txt", "Beta one."),
            passage("a.txt", "Alpha two."),
        ];
        let analysis = fallback_analysis(&passages, true);
        let a = analysis.find("a.txt:").unwrap_or_else(|| unreachable!());
        let b = analysis.find("b.txt:").unwrap_or_else(|| unreachable!());
        assert!(a < b);
        assert!(analysis.contains("a.txt:\n- Alpha one. [S1]\n- Alpha two. [S3]"));
        assert!(analysis.contains("b.txt:\n- Beta one. [S2]"));
    }
}
