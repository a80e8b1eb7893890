//! # docent
//!
//! Multi-agent question answering over plain-text documents.
//!
//! Each query is routed through a fixed pipeline of stages (retriever,
//! summarizer, analyst, QA) that share one write-once [`PipelineState`].
//! Failed gateway calls are retried with exponential backoff and then
//! replaced by a deterministic fallback, so a run degrades instead of
//! failing whenever some answer can still be given.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docent::agent::{Orchestrator, PipelineConfig, create_provider};
//! use docent::core::{DocumentId, DocumentScope};
//! use docent::retrieval::{MemoryIndex, RetrievalGateway};
//!
//! # async fn run() -> docent::Result<()> {
//! let mut index = MemoryIndex::new();
//! index.add_document(DocumentId::new("energy.txt"), "Solar and wind are renewable.");
//! let retrieval: Arc<dyn RetrievalGateway> = Arc::new(index);
//!
//! let config = PipelineConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let orchestrator = Orchestrator::new(Arc::from(provider), retrieval, config);
//!
//! let scope = DocumentScope::single(DocumentId::new("energy.txt"));
//! let outcome = orchestrator.run("What is the main topic?", scope, Vec::new()).await;
//! println!("{}", outcome.display_text());
//! # Ok(())
//! # }
//! ```
//!
//! [`PipelineState`]: agent::PipelineState

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod retrieval;

pub use agent::{Coordinator, Orchestrator, PipelineConfig, PipelineOutcome, RunMode, RunStatus};
pub use crate::core::{DocumentId, DocumentScope, Passage, Turn};
pub use error::{ConfigError, Error, PipelineError, Result};
pub use retrieval::{MemoryIndex, RetrievalGateway};
