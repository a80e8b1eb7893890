//! Retrieval gateway: maps a query and scope to ranked passages.
//!
//! The pipeline only depends on [`RetrievalGateway`]. [`MemoryIndex`] is the
//! in-process implementation used by the CLI; vector stores or remote
//! search services plug in behind the same trait.

pub mod chunking;
pub mod memory;

use async_trait::async_trait;

use crate::core::{DocumentId, DocumentScope, Passage};
use crate::error::RetrievalError;

pub use chunking::{CHUNK_OVERLAP, CHUNK_SIZE, split_passages};
pub use memory::MemoryIndex;

/// Trait for retrieval backends.
///
/// Implementations must be safe for concurrent calls from independent
/// pipeline runs: `search` takes `&self` and must not rely on shared
/// mutable state.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    /// Returns `true` if `document` has been indexed.
    fn is_indexed(&self, document: &DocumentId) -> bool;

    /// Returns up to `k` passages from `scope`, best first.
    ///
    /// Equal scores keep the backend's own retrieval order.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the backend is unreachable.
    async fn search(
        &self,
        query: &str,
        scope: &DocumentScope,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError>;
}
