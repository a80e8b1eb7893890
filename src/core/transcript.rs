//! Chat transcript with JSON and Markdown export.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The answer recorded for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptResponse {
    /// One answer for the whole scope.
    Single(String),
    /// One answer per document label, in selection order.
    PerDocument(Vec<(String, String)>),
}

/// One question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// The question asked.
    pub query: String,
    /// Answer(s) given.
    pub response: TranscriptResponse,
    /// Documents the question was asked against.
    pub documents: Vec<String>,
    /// When the answer was produced.
    pub timestamp: DateTime<Utc>,
    /// `completed`, `failed`, or `partial` for mixed multi-document runs.
    pub status: String,
}

/// Ordered list of exchanges in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    export_timestamp: DateTime<Utc>,
    total_chats: usize,
    chat_history: &'a [TranscriptEntry],
}

#[derive(Deserialize)]
struct JsonImport {
    chat_history: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an exchange.
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Recorded exchanges, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the transcript as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if an entry cannot be encoded.
    pub fn to_json(&self, exported_at: DateTime<Utc>) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonExport {
            export_timestamp: exported_at,
            total_chats: self.entries.len(),
            chat_history: &self.entries,
        })
    }

    /// Reads back a transcript written by [`Transcript::to_json`].
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if `json` is not a transcript export.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let import: JsonImport = serde_json::from_str(json)?;
        Ok(Self {
            entries: import.chat_history,
        })
    }

    /// Renders the transcript as a Markdown document.
    #[must_use]
    pub fn to_markdown(&self, exported_at: DateTime<Utc>) -> String {
        let mut out = String::from("# Document Chat Export\n\n");
        let _ = writeln!(
            out,
            "**Export Date:** {}",
            exported_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "**Total Conversations:** {}\n\n---\n", self.entries.len());

        for (i, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "## Conversation {} ({})\n", i + 1, entry.status);
            let _ = writeln!(out, "**Question:** {}\n", entry.query);
            match &entry.response {
                TranscriptResponse::Single(answer) => {
                    let _ = writeln!(out, "**Answer:** {answer}\n");
                }
                TranscriptResponse::PerDocument(answers) => {
                    out.push_str("**Answer:**\n\n");
                    for (label, answer) in answers {
                        let _ = writeln!(out, "### {label}\n\n{answer}\n");
                    }
                }
            }
            let _ = writeln!(out, "**Documents:** {}", entry.documents.join(", "));
            let _ = writeln!(
                out,
                "**Timestamp:** {}\n\n---\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn sample() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry {
            query: "What is the main topic?".to_string(),
            response: TranscriptResponse::Single("Solar power [S1]".to_string()),
            documents: vec!["energy.txt".to_string()],
            timestamp: at(),
            status: "completed".to_string(),
        });
        transcript.push(TranscriptEntry {
            query: "Compare them".to_string(),
            response: TranscriptResponse::PerDocument(vec![
                ("a.txt".to_string(), "A answer".to_string()),
                ("b.txt".to_string(), "B answer".to_string()),
            ]),
            documents: vec!["a.txt".to_string(), "b.txt".to_string()],
            timestamp: at(),
            status: "partial".to_string(),
        });
        transcript
    }

    #[test]
    fn test_markdown_export() {
        let md = sample().to_markdown(at());
        assert!(md.contains("**Total Conversations:** 2"));
        assert!(md.contains("## Conversation 1 (completed)"));
        assert!(md.contains("**Answer:** Solar power [S1]"));
        assert!(md.contains("### b.txt\n\nB answer"));
        assert!(md.contains("**Documents:** a.txt, b.txt"));
        assert!(md.contains("2025-03-01 12:00:00"));
    }

    #[test]
    fn test_json_export() {
        let json = sample().to_json(at()).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(value["total_chats"], 2);
        assert_eq!(value["chat_history"][0]["response"], "Solar power [S1]");
        assert_eq!(value["chat_history"][1]["response"][0][0], "a.txt");
    }

    #[test]
    fn test_json_export_reads_back() {
        let json = sample().to_json(at()).unwrap_or_default();
        let transcript = Transcript::from_json(&json).unwrap_or_default();
        assert_eq!(transcript.entries().len(), 2);
        assert_eq!(transcript.entries()[1].status, "partial");
        assert!(Transcript::from_json(r#"{"theme": "dark"}"#).is_err());
    }

    #[test]
    fn test_empty_transcript() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert!(transcript.to_markdown(at()).contains("**Total Conversations:** 0"));
    }
}
