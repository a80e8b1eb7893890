//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use crate::agent::config::PipelineConfig;
use crate::agent::provider::LlmProvider;
use crate::error::ConfigError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default, feature `openai`): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown provider names
/// and [`ConfigError::ApiKeyMissing`] when the provider needs a key.
pub fn create_provider(config: &PipelineConfig) -> Result<Box<dyn LlmProvider>, ConfigError> {
    match config.provider.as_str() {
        #[cfg(feature = "openai")]
        "openai" => {
            let api_key = config.api_key.as_deref().ok_or(ConfigError::ApiKeyMissing)?;
            Ok(Box::new(crate::agent::providers::OpenAiProvider::new(
                api_key,
                config.base_url.as_deref(),
            )))
        }
        other => Err(ConfigError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
