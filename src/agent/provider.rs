//! Pluggable generation gateway.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. This keeps all stage logic decoupled
//! from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::GenerationError;

/// Generation backend.
///
/// Independent pipeline
/// runs call the same provider concurrently, so implementations must not
/// keep per-request mutable state.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name shown in logs (e.g. `"openai"`).
    fn name(&self) -> &'static str;

    /// Sends one chat completion request.
    ///
    /// Retries and timeouts are applied by the calling stage, not here.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::RateLimited`] when throttled and
    /// [`GenerationError::Provider`] for any other failure.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GenerationError>;
}
