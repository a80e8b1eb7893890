//! Staged question answering over indexed documents.
//!
//! Every query runs through a fixed, linear pipeline of agents. Gateway
//! failures are absorbed by a resilient call (retry with exponential
//! backoff, then a deterministic fallback) so a run only fails on
//! unrecoverable errors.
//!
//! # Architecture
//!
//! ```text
//! User query → Coordinator (one run per scope, or one merged scope)
//!   └── Orchestrator (one run)
//!       ├── Retriever   → retrieved_passages
//!       ├── Summarizer  → condensed_summary
//!       ├── Analyst     → analysis
//!       └── QA          → final_answer (cited)
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod digest;
pub mod message;
pub mod orchestrator;
pub mod outcome;
pub mod phase;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod resilient;
pub mod stages;
pub mod state;
pub mod traits;

// Re-export key types
pub use client::create_provider;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use coordinator::{Coordinator, MultiOutcome, RunMode, ScopeResult};
pub use digest::{Digest, DigestAgent};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use outcome::{PipelineOutcome, RunStatus};
pub use phase::{Phase, Stage};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use resilient::{Resolution, ResilienceError, RetryPolicy, resilient_call};
pub use stages::{AnalystAgent, QaAgent, SummarizerAgent};
pub use state::{Artifact, PipelineState, Provenance, Retrieval, StageErrorRecord, StageUpdate};
pub use traits::{Agent, AgentResponse};
