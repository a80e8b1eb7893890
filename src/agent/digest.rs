//! Document digest: a structured overview of one indexed document.
//!
//! The document is sampled with fixed sample queries instead of being read
//! in full, so the overview stays bounded for large inputs.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::config::PipelineConfig;
use super::message::TokenUsage;
use super::phase::Stage;
use super::prompt::{NO_CONTENT_SUMMARY, build_digest_prompt};
use super::resilient::{CallFailure, call_with_retry};
use super::stages::{StageContext, generate, truncate_chars};
use super::state::Artifact;
use super::traits::Agent;
use crate::core::{DocumentId, DocumentScope, Passage};
use crate::error::PipelineError;

/// Queries used to sample the document.
pub const SAMPLE_QUERIES: [&str; 3] = [
    "main topics and key points",
    "important conclusions and findings",
    "methodology and approach",
];

/// Passages kept per sample query.
const PASSAGES_PER_QUERY: usize = 2;
/// Upper bound on sampled passages.
const MAX_PASSAGES: usize = 8;
/// Prefix length used to detect duplicate passages.
const DEDUP_PREFIX_CHARS: usize = 100;
/// Upper bound on the combined excerpt.
const MAX_EXCERPT_CHARS: usize = 16_000;
/// Marker appended to a truncated excerpt.
const TRUNCATION_MARKER: &str = "\n... [Content truncated]";

/// Overview of one document.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    /// Summarized document.
    pub document: DocumentId,
    /// Overview text and how it was produced.
    pub summary: Artifact,
    /// Distinct passages the overview was built from.
    pub passages_used: usize,
    /// Model that was asked for the overview.
    pub model: String,
    /// Tokens used by the generation call.
    pub usage: TokenUsage,
    /// When the digest was produced.
    pub generated_at: DateTime<Utc>,
}

/// Agent that writes document overviews.
pub struct DigestAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl DigestAgent {
    /// Creates a new digest agent. Uses the summarizer model and budget.
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
impl Agent for DigestAgent {
    fn name(&self) -> &'static str {
        "digest"
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

/// Drops passages whose leading characters repeat an earlier passage.
fn dedup_passages(passages: Vec<Passage>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|p| seen.insert(p.text.chars().take(DEDUP_PREFIX_CHARS).collect::<String>()))
        .take(MAX_PASSAGES)
        .collect()
}

/// Joins passage texts, truncating past [`MAX_EXCERPT_CHARS`].
fn combine_excerpt(passages: &[Passage]) -> String {
    let combined = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if combined.chars().count() > MAX_EXCERPT_CHARS {
        let mut truncated = truncate_chars(&combined, MAX_EXCERPT_CHARS);
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    } else {
        combined
    }
}

pub(crate) async fn digest_document(
    ctx: &StageContext<'_>,
    document: &DocumentId,
) -> Result<Digest, PipelineError> {
    let scope = DocumentScope::single(document.clone());
    if !ctx.retrieval.is_indexed(document) {
        return Err(PipelineError::EmptyScope {
            scope: scope.to_string(),
        });
    }

    let mut sampled = Vec::new();
    for query in SAMPLE_QUERIES {
        let result = call_with_retry(Stage::Retriever, &ctx.policy, ctx.cancel, || {
            ctx.retrieval.search(query, &scope, PASSAGES_PER_QUERY)
        })
        .await;
        match result {
            Ok(passages) => sampled.extend(passages.into_iter().take(PASSAGES_PER_QUERY)),
            Err(CallFailure::Cancelled) => return Err(PipelineError::Cancelled),
            Err(CallFailure::Exhausted { last, .. }) => {
                warn!(%document, query, error = %last, "digest sample query failed, skipping");
            }
        }
    }

    let passages = dedup_passages(sampled);
    debug!(%document, passages = passages.len(), "digest sample collected");

    let agent = DigestAgent::new(ctx.config, ctx.prompts.digest.clone());
    let model = agent.model().to_string();
    if passages.is_empty() {
        return Ok(Digest {
            document: document.clone(),
            summary: Artifact::marker(NO_CONTENT_SUMMARY),
            passages_used: 0,
            model,
            usage: TokenUsage::default(),
            generated_at: Utc::now(),
        });
    }

    let excerpt = combine_excerpt(&passages);
    let user_msg = build_digest_prompt(document.as_str(), &excerpt);
    let generation = generate(ctx, Stage::Summarizer, &agent, &user_msg, || excerpt.clone()).await?;

    Ok(Digest {
        document: document.clone(),
        summary: generation.artifact,
        passages_used: passages.len(),
        model,
        usage: generation.usage,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> Passage {
        Passage {
            text: text.to_string(),
            locator: "doc#0".to_string(),
            document: DocumentId::new("doc"),
            score: 1.0,
        }
    }

    #[test]
    fn test_dedup_on_prefix() {
        let long_a = format!("{}tail one", "x".repeat(DEDUP_PREFIX_CHARS));
        let long_b = format!("{}tail two", "x".repeat(DEDUP_PREFIX_CHARS));
        let kept = dedup_passages(vec![passage(&long_a), passage("other"), passage(&long_b)]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].text, "other");
    }

    #[test]
    fn test_dedup_caps_passage_count() {
        let many: Vec<Passage> = (0..12).map(|i| passage(&format!("passage {i}"))).collect();
        assert_eq!(dedup_passages(many).len(), MAX_PASSAGES);
    }

    #[test]
    fn test_combine_excerpt_truncates() {
        let short = combine_excerpt(&[passage("a"), passage("b")]);
        assert_eq!(short, "a\n\nb");

        let big = "y".repeat(MAX_EXCERPT_CHARS + 10);
        let excerpt = combine_excerpt(&[passage(&big)]);
        assert!(excerpt.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            excerpt.chars().count(),
            MAX_EXCERPT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }
}
