//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default number of passages retrieved per run.
const DEFAULT_TOP_K: usize = 4;
/// Default per-stage gateway timeout in seconds.
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 60;
/// Default retries after the first failed gateway call.
const DEFAULT_MAX_RETRIES: u32 = 1;
/// Default delay before the first retry; doubled for each further retry.
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
/// Default upper bound on the condensed summary, in characters.
const DEFAULT_SUMMARY_MAX_CHARS: usize = 4000;
/// Default concurrent pipelines in a multi-document run.
const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Default number of prior turns shown to the QA stage.
const DEFAULT_HISTORY_WINDOW: usize = 6;
/// Default summarizer max tokens.
const DEFAULT_SUMMARIZER_MAX_TOKENS: u32 = 2048;
/// Default analyst max tokens.
const DEFAULT_ANALYST_MAX_TOKENS: u32 = 4096;
/// Default QA max tokens.
const DEFAULT_QA_MAX_TOKENS: u32 = 4096;
/// Default model for the condensing stages.
const DEFAULT_FAST_MODEL: &str = "gpt-5-mini-2025-08-07";
/// Default model for the final review stage.
const DEFAULT_REVIEW_MODEL: &str = "gpt-5.2-2025-12-11";

/// Configuration for the agent pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Generation provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider. Only required when a provider is created.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the summarizer stage.
    pub summarizer_model: String,
    /// Model for the analyst stage.
    pub analyst_model: String,
    /// Model for the QA stage.
    pub qa_model: String,
    /// Maximum tokens for summarizer responses.
    pub summarizer_max_tokens: u32,
    /// Maximum tokens for analyst responses.
    pub analyst_max_tokens: u32,
    /// Maximum tokens for QA responses.
    pub qa_max_tokens: u32,
    /// Passages retrieved per run (`K`).
    pub top_k: usize,
    /// Timeout applied to each gateway call of a stage.
    pub stage_timeout: Duration,
    /// Retries after the first failed gateway call.
    pub max_retries: u32,
    /// Delay before the first retry. Each further retry doubles it.
    pub retry_base_delay: Duration,
    /// Whether stages may substitute deterministic fallback output.
    ///
    /// Generative stages always fall back. This flag governs retrieval:
    /// when disabled, an unreachable index fails the run instead of
    /// continuing with an insufficient-context marker.
    pub fallback_enabled: bool,
    /// Upper bound on the condensed summary, in characters.
    pub summary_max_chars: usize,
    /// Maximum concurrent pipelines in a multi-document run.
    pub max_concurrency: usize,
    /// Prior conversation turns included in the QA prompt.
    pub history_window: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, stages load system prompts from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing
    /// files.
    pub prompt_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Creates a new builder for `PipelineConfig`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a resolved value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    summarizer_model: Option<String>,
    analyst_model: Option<String>,
    qa_model: Option<String>,
    summarizer_max_tokens: Option<u32>,
    analyst_max_tokens: Option<u32>,
    qa_max_tokens: Option<u32>,
    top_k: Option<usize>,
    stage_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    fallback_enabled: Option<bool>,
    summary_max_chars: Option<usize>,
    max_concurrency: Option<usize>,
    history_window: Option<usize>,
    prompt_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl PipelineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("DOCENT_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DOCENT_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DOCENT_BASE_URL"))
                .ok();
        }
        if self.summarizer_model.is_none() {
            self.summarizer_model = std::env::var("DOCENT_SUMMARIZER_MODEL").ok();
        }
        if self.analyst_model.is_none() {
            self.analyst_model = std::env::var("DOCENT_ANALYST_MODEL").ok();
        }
        if self.qa_model.is_none() {
            self.qa_model = std::env::var("DOCENT_QA_MODEL").ok();
        }
        if self.top_k.is_none() {
            self.top_k = env_parse("DOCENT_TOP_K");
        }
        if self.stage_timeout.is_none() {
            self.stage_timeout = env_parse("DOCENT_STAGE_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parse("DOCENT_MAX_RETRIES");
        }
        if self.fallback_enabled.is_none() {
            self.fallback_enabled = std::env::var("DOCENT_FALLBACK")
                .ok()
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no"));
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("DOCENT_MAX_CONCURRENCY");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DOCENT_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the summarizer model.
    #[must_use]
    pub fn summarizer_model(mut self, model: impl Into<String>) -> Self {
        self.summarizer_model = Some(model.into());
        self
    }

    /// Sets the analyst model.
    #[must_use]
    pub fn analyst_model(mut self, model: impl Into<String>) -> Self {
        self.analyst_model = Some(model.into());
        self
    }

    /// Sets the QA model.
    #[must_use]
    pub fn qa_model(mut self, model: impl Into<String>) -> Self {
        self.qa_model = Some(model.into());
        self
    }

    /// Sets the summarizer max tokens.
    #[must_use]
    pub const fn summarizer_max_tokens(mut self, n: u32) -> Self {
        self.summarizer_max_tokens = Some(n);
        self
    }

    /// Sets the analyst max tokens.
    #[must_use]
    pub const fn analyst_max_tokens(mut self, n: u32) -> Self {
        self.analyst_max_tokens = Some(n);
        self
    }

    /// Sets the QA max tokens.
    #[must_use]
    pub const fn qa_max_tokens(mut self, n: u32) -> Self {
        self.qa_max_tokens = Some(n);
        self
    }

    /// Sets the number of passages retrieved per run.
    #[must_use]
    pub const fn top_k(mut self, n: usize) -> Self {
        self.top_k = Some(n);
        self
    }

    /// Sets the per-stage gateway timeout.
    #[must_use]
    pub const fn stage_timeout(mut self, duration: Duration) -> Self {
        self.stage_timeout = Some(duration);
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Enables or disables the retrieval fallback path.
    #[must_use]
    pub const fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = Some(enabled);
        self
    }

    /// Sets the summary length bound in characters.
    #[must_use]
    pub const fn summary_max_chars(mut self, n: usize) -> Self {
        self.summary_max_chars = Some(n);
        self
    }

    /// Sets the multi-document concurrency limit.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the number of prior turns shown to the QA stage.
    #[must_use]
    pub const fn history_window(mut self, n: usize) -> Self {
        self.history_window = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `top_k`, `summary_max_chars` or
    /// `max_concurrency` is zero, or the stage timeout is zero.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key: self.api_key,
            base_url: self.base_url,
            summarizer_model: self
                .summarizer_model
                .unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            analyst_model: self
                .analyst_model
                .unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            qa_model: self
                .qa_model
                .unwrap_or_else(|| DEFAULT_REVIEW_MODEL.to_string()),
            summarizer_max_tokens: self
                .summarizer_max_tokens
                .unwrap_or(DEFAULT_SUMMARIZER_MAX_TOKENS),
            analyst_max_tokens: self
                .analyst_max_tokens
                .unwrap_or(DEFAULT_ANALYST_MAX_TOKENS),
            qa_max_tokens: self.qa_max_tokens.unwrap_or(DEFAULT_QA_MAX_TOKENS),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            stage_timeout: self
                .stage_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: self
                .retry_base_delay
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS)),
            fallback_enabled: self.fallback_enabled.unwrap_or(true),
            summary_max_chars: self.summary_max_chars.unwrap_or(DEFAULT_SUMMARY_MAX_CHARS),
            max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            history_window: self.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW),
            prompt_dir: self.prompt_dir,
        };

        let invalid = |message: &str| ConfigError::Invalid {
            message: message.to_string(),
        };
        if config.top_k == 0 {
            return Err(invalid("top_k must be at least 1"));
        }
        if config.summary_max_chars == 0 {
            return Err(invalid("summary_max_chars must be at least 1"));
        }
        if config.max_concurrency == 0 {
            return Err(invalid("max_concurrency must be at least 1"));
        }
        if config.stage_timeout.is_zero() {
            return Err(invalid("stage_timeout must be non-zero"));
        }
        Ok(config)
    }
}
