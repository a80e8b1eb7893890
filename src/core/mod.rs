//! Core data types shared by the pipeline, the gateways and the CLI.
//!
//! These types carry no async or provider dependencies so they can be
//! used by retrieval backends and output formatting alike.

pub mod history;
pub mod passage;
pub mod transcript;

pub use history::{Speaker, Turn};
pub use passage::{DocumentId, DocumentScope, Passage, citation_label, render_sources};
pub use transcript::{Transcript, TranscriptEntry, TranscriptResponse};
