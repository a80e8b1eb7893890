//! In-process lexical index over plain-text documents.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::RetrievalGateway;
use super::chunking::{CHUNK_OVERLAP, CHUNK_SIZE, split_passages};
use crate::core::{DocumentId, DocumentScope, Passage};
use crate::error::RetrievalError;

/// Words ignored when scoring, so question phrasing does not dominate.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "which", "who",
    "why", "with",
];

#[derive(Debug)]
struct IndexedPassage {
    text: String,
    locator: String,
    terms: HashSet<String>,
}

#[derive(Debug)]
struct IndexedDocument {
    id: DocumentId,
    passages: Vec<IndexedPassage>,
}

/// Lexical index scoring passages by query-term coverage.
///
/// The score of a passage is the fraction of distinct query terms it
/// contains. Passages that match no term still fill the top `k` with a
/// score of 0, in index order, so a search only comes back empty when the
/// scope holds no passages.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Vec<IndexedDocument>,
}

impl MemoryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `text` under `id` using the default passage size.
    ///
    /// Re-adding an existing id replaces its passages. Returns the number
    /// of passages indexed.
    pub fn add_document(&mut self, id: DocumentId, text: &str) -> usize {
        self.add_document_with(id, text, CHUNK_SIZE, CHUNK_OVERLAP)
    }

    /// Indexes `text` under `id` with an explicit passage size and overlap.
    pub fn add_document_with(
        &mut self,
        id: DocumentId,
        text: &str,
        size: usize,
        overlap: usize,
    ) -> usize {
        let passages: Vec<IndexedPassage> = split_passages(text, size, overlap)
            .into_iter()
            .enumerate()
            .map(|(n, text)| IndexedPassage {
                locator: format!("{id}#{n}"),
                terms: terms(&text),
                text,
            })
            .collect();
        let count = passages.len();

        debug!(document = %id, passages = count, "indexed document");
        let doc = IndexedDocument { id, passages };
        if let Some(existing) = self.documents.iter_mut().find(|d| d.id == doc.id) {
            *existing = doc;
        } else {
            self.documents.push(doc);
        }
        count
    }

    /// Indexed document ids in insertion order.
    pub fn document_ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.iter().map(|d| &d.id)
    }

    /// Number of passages indexed for `document`, if present.
    #[must_use]
    pub fn passage_count(&self, document: &DocumentId) -> Option<usize> {
        self.documents
            .iter()
            .find(|d| &d.id == document)
            .map(|d| d.passages.len())
    }

    fn rank(&self, query: &str, scope: &DocumentScope, k: usize) -> Vec<Passage> {
        if k == 0 {
            return Vec::new();
        }
        let query_terms = terms(query);
        #[allow(clippy::cast_precision_loss)]
        let total = query_terms.len().max(1) as f32;

        let mut hits: Vec<Passage> = Vec::new();
        for doc_id in scope.documents() {
            let Some(doc) = self.documents.iter().find(|d| &d.id == doc_id) else {
                continue;
            };
            for p in &doc.passages {
                let matched = query_terms.iter().filter(|t| p.terms.contains(*t)).count();
                #[allow(clippy::cast_precision_loss)]
                let score = matched as f32 / total;
                hits.push(Passage {
                    text: p.text.clone(),
                    locator: p.locator.clone(),
                    document: doc.id.clone(),
                    score,
                });
            }
        }

        // Stable: equal scores, including unmatched passages at 0, keep
        // scope and passage order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

/// Lower-cased distinct words of `text`, minus stopwords.
fn terms(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait]
impl RetrievalGateway for MemoryIndex {
    fn is_indexed(&self, document: &DocumentId) -> bool {
        self.documents.iter().any(|d| &d.id == document)
    }

    async fn search(
        &self,
        query: &str,
        scope: &DocumentScope,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self.rank(query, scope, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index.add_document_with(
            DocumentId::new("energy.txt"),
            "Solar subsidies expanded.\n\nWind capacity doubled.\n\nSolar and wind together lead.",
            30,
            0,
        );
        index.add_document_with(
            DocumentId::new("budget.txt"),
            "The budget allocates funds to wind projects.",
            1000,
            0,
        );
        index
    }

    fn scope(ids: &[&str]) -> DocumentScope {
        ids.iter().copied().map(DocumentId::from).collect()
    }

    #[tokio::test]
    async fn test_ranks_by_term_coverage() {
        let index = index();
        let hits = index
            .search("solar wind", &scope(&["energy.txt"]), 10)
            .await
            .unwrap_or_default();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].locator, "energy.txt#2");
        assert!((hits[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_ties_keep_index_order() {
        let index = index();
        let hits = index
            .search("wind", &scope(&["energy.txt", "budget.txt"]), 10)
            .await
            .unwrap_or_default();
        let locators: Vec<&str> = hits.iter().map(|p| p.locator.as_str()).collect();
        assert_eq!(
            locators,
            vec!["energy.txt#1", "energy.txt#2", "budget.txt#0", "energy.txt#0"]
        );
        assert!(hits[3].score.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_respects_scope_and_k() {
        let index = index();
        let hits = index
            .search("wind", &scope(&["budget.txt"]), 10)
            .await
            .unwrap_or_default();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.as_str(), "budget.txt");

        let hits = index
            .search("wind", &scope(&["energy.txt", "budget.txt"]), 1)
            .await
            .unwrap_or_default();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_stopword_only_query_keeps_index_order() {
        let hits = index()
            .search("what is the", &scope(&["energy.txt"]), 2)
            .await
            .unwrap_or_default();
        let locators: Vec<&str> = hits.iter().map(|p| p.locator.as_str()).collect();
        assert_eq!(locators, vec!["energy.txt#0", "energy.txt#1"]);
        assert!(hits.iter().all(|p| p.score.abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_unmatched_topic_question_still_returns_passages() {
        let mut index = MemoryIndex::new();
        index.add_document_with(
            DocumentId::new("policy.txt"),
            "Renewable energy policy sets a 40% target for 2030.\n\n\
             Feed-in tariffs support renewable energy producers.\n\n\
             The policy phases out coal subsidies.",
            60,
            0,
        );
        let hits = index
            .search("What is the main topic?", &scope(&["policy.txt"]), 10)
            .await
            .unwrap_or_default();
        assert!(!hits.is_empty());
        assert_eq!(Some(hits.len()), index.passage_count(&DocumentId::new("policy.txt")));
        assert_eq!(hits[0].locator, "policy.txt#0");
        assert!(hits[0].text.contains("Renewable energy"));
    }

    #[tokio::test]
    async fn test_empty_document_returns_nothing() {
        let mut index = MemoryIndex::new();
        index.add_document(DocumentId::new("blank.txt"), "   ");
        let hits = index
            .search("main topic", &scope(&["blank.txt"]), 4)
            .await
            .unwrap_or_default();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_is_indexed_and_replace() {
        let mut index = index();
        assert!(index.is_indexed(&DocumentId::new("budget.txt")));
        assert!(!index.is_indexed(&DocumentId::new("missing.txt")));
        index.add_document(DocumentId::new("budget.txt"), "replaced");
        assert_eq!(index.passage_count(&DocumentId::new("budget.txt")), Some(1));
        assert_eq!(index.document_ids().count(), 2);
    }
}
