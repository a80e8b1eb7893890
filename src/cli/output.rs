//! Output formatting for CLI commands.
//!
//! Text output is meant for people, JSON output for scripts.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;

use crate::agent::{Digest, MultiOutcome, PipelineOutcome, Provenance, RunMode};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    ///
    /// Serialization failures are reported inside the JSON itself so the
    /// command still prints something parseable.
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string()
        })
    }
}

/// Formats the footer line for one run.
fn format_run_stats(outcome: &PipelineOutcome) -> String {
    let degraded = if outcome.stage_errors.is_empty() {
        String::new()
    } else {
        format!(" | Degraded: {} stage error(s)", outcome.stage_errors.len())
    };
    format!(
        "Status: {} | Tokens: {} | Time: {:.1}s{degraded}",
        status_label(outcome),
        outcome.usage.total_tokens,
        Duration::from_millis(outcome.elapsed_ms).as_secs_f64()
    )
}

fn status_label(outcome: &PipelineOutcome) -> &'static str {
    if outcome.is_completed() {
        "completed"
    } else {
        "failed"
    }
}

/// Formats a single run for text output.
#[must_use]
pub fn format_outcome(outcome: &PipelineOutcome, verbose: bool) -> String {
    let mut output = outcome.display_text();
    let _ = write!(output, "\n\n---\n{}", format_run_stats(outcome));
    if verbose {
        let trace: Vec<String> = outcome
            .trace
            .iter()
            .map(|p| format!("{p:?}").to_lowercase())
            .collect();
        let _ = write!(output, "\nTrace: {}", trace.join(" -> "));
        if outcome.is_completed() {
            for record in &outcome.stage_errors {
                let _ = write!(output, "\nStage error ({}): {}", record.stage, record.message);
            }
        }
    }
    output
}

/// Formats a multi-document result for text output.
///
/// A single run prints just that run; several runs get one section each,
/// in selection order.
#[must_use]
pub fn format_multi_outcome(multi: &MultiOutcome, verbose: bool) -> String {
    if let [only] = multi.results.as_slice() {
        let mut output = format_outcome(&only.outcome, verbose);
        if multi.mode == RunMode::Comparative && verbose {
            let _ = write!(output, "\nScope: {}", only.scope);
        }
        return output;
    }

    let mut output = String::new();
    for result in &multi.results {
        let _ = writeln!(output, "=== {} ===\n", result.scope);
        output.push_str(&format_outcome(&result.outcome, verbose));
        output.push_str("\n\n");
    }
    let _ = write!(
        output,
        "{}/{} document run(s) completed",
        multi.completed_count(),
        multi.results.len()
    );
    output
}

/// Formats a document digest for text output.
#[must_use]
pub fn format_digest(digest: &Digest) -> String {
    let mut output = format!("Digest: {}\n\n", digest.document);
    output.push_str(&digest.summary.text);
    let source = match digest.summary.provenance {
        Provenance::Generated => "generated",
        Provenance::Fallback => "fallback excerpt",
        Provenance::Marker => "no content",
    };
    let _ = write!(
        output,
        "\n\n---\nSource: {source} | Passages: {} | Model: {} | Tokens: {} | Generated: {}",
        digest.passages_used,
        digest.model,
        digest.usage.total_tokens,
        digest.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Artifact, RunStatus, ScopeResult, TokenUsage};
    use crate::core::{DocumentId, DocumentScope};
    use crate::error::PipelineError;
    use chrono::Utc;

    fn completed(answer: &str) -> PipelineOutcome {
        PipelineOutcome {
            status: RunStatus::Completed,
            final_answer: Some(answer.to_string()),
            failure: None,
            stage_errors: Vec::new(),
            state: None,
            history: Vec::new(),
            trace: Vec::new(),
            usage: TokenUsage::default(),
            elapsed_ms: 1500,
        }
    }

    fn failed() -> PipelineOutcome {
        PipelineOutcome {
            status: RunStatus::Failed,
            final_answer: None,
            failure: Some(PipelineError::RetrievalUnavailable {
                message: "index offline".to_string(),
            }),
            ..completed("")
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse(" JSON "), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_single_outcome() {
        let output = format_outcome(&completed("Solar [S1]"), false);
        assert!(output.starts_with("Solar [S1]"));
        assert!(output.contains("Status: completed"));
        assert!(output.contains("Time: 1.5s"));
    }

    #[test]
    fn test_format_multi_outcome_sections() {
        let multi = MultiOutcome {
            mode: RunMode::Independent,
            results: vec![
                ScopeResult {
                    scope: DocumentScope::single(DocumentId::new("a.txt")),
                    outcome: completed("answer a [S1]"),
                },
                ScopeResult {
                    scope: DocumentScope::single(DocumentId::new("b.txt")),
                    outcome: failed(),
                },
            ],
        };
        let output = format_multi_outcome(&multi, false);
        assert!(output.contains("answer a [S1]"));
        assert!(output.contains("RetrievalUnavailableError"));
        assert!(output.ends_with("1/2 document run(s) completed"));
        let a = output.find("a.txt").unwrap_or(usize::MAX);
        let b = output.find("b.txt").unwrap_or(0);
        assert!(a < b);
    }

    #[test]
    fn test_format_digest_marker() {
        let digest = Digest {
            document: DocumentId::new("empty.txt"),
            summary: Artifact::marker("NO_CONTENT"),
            passages_used: 0,
            model: "gpt-4o-mini".to_string(),
            usage: TokenUsage::default(),
            generated_at: Utc::now(),
        };
        let output = format_digest(&digest);
        assert!(output.starts_with("Digest: empty.txt"));
        assert!(output.contains("Source: no content"));
    }

    #[test]
    fn test_to_json_outcome() {
        let json = OutputFormat::Json.to_json(&completed("x [S1]"));
        assert!(json.contains("\"status\": \"completed\""));
    }
}
