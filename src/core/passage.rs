//! Documents, scopes and retrieved passages.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

/// Identifier of an indexed document (typically its file name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The documents a run may retrieve from.
///
/// Order is the caller's selection order. A scope is fixed for the
/// lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentScope(Vec<DocumentId>);

impl DocumentScope {
    /// Creates a scope from an ordered list of documents.
    #[must_use]
    pub const fn new(documents: Vec<DocumentId>) -> Self {
        Self(documents)
    }

    /// Scope covering a single document.
    #[must_use]
    pub fn single(document: DocumentId) -> Self {
        Self(vec![document])
    }

    /// Documents in selection order.
    #[must_use]
    pub fn documents(&self) -> &[DocumentId] {
        &self.0
    }

    /// Returns `true` if no document was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the scope spans more than one document.
    #[must_use]
    pub fn is_multi_document(&self) -> bool {
        self.0.len() > 1
    }

    /// Returns `true` if `document` is part of this scope.
    #[must_use]
    pub fn contains(&self, document: &DocumentId) -> bool {
        self.0.contains(document)
    }
}

impl fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        for (i, doc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(doc.as_str())?;
        }
        f.write_char(']')
    }
}

impl FromIterator<DocumentId> for DocumentScope {
    fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A ranked passage returned by the retrieval gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub text: String,
    /// Source locator (e.g. `report.txt#3`).
    pub locator: String,
    /// Document the passage belongs to.
    pub document: DocumentId,
    /// Similarity score, higher is more relevant.
    pub score: f32,
}

/// Citation label for the passage at `index` in retrieval order (`[S1]`, ...).
#[must_use]
pub fn citation_label(index: usize) -> String {
    format!("[S{}]", index + 1)
}

/// Renders the deterministic sources block appended to answers.
///
/// Returns an empty string when there are no passages.
#[must_use]
pub fn render_sources(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return String::new();
    }
    let mut out = String::from("Sources:");
    for (i, p) in passages.iter().enumerate() {
        let _ = write!(out, "\n{} {}", citation_label(i), p.locator);
    }
    out
}
