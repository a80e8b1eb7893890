//! Agent trait definition.
//!
//! The summarizer, analyst, review and digest agents implement this trait,
//! which provides a uniform interface for the stages that drive them.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::GenerationError;

/// Text produced by one agent call.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output. Never blank.
    pub content: String,
    /// Tokens consumed by the call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// A generation role: fixed system prompt, model and sampling settings.
///
/// Stages call [`Agent::execute`] through the resilient call wrapper, so
/// one invocation is one gateway attempt.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Model the agent asks for.
    fn model(&self) -> &str;

    /// Instructions sent as the system message.
    fn system_prompt(&self) -> &str;

    /// Sampling temperature. Stages keep this low.
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Completion token budget.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Sends `user_msg` under this agent's system prompt.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`GenerationError`], or
    /// [`GenerationError::EmptyResponse`] when the model returned only
    /// whitespace.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, GenerationError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
        };

        let response: ChatResponse = provider.chat(&request).await?;
        if response.content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        tracing::debug!(
            agent = self.name(),
            model = self.model(),
            total_tokens = response.usage.total_tokens,
            "agent call completed"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}
