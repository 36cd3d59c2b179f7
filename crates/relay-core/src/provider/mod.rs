//! Text-generation providers
//!
//! Both backends answer one prompt with one piece of text. The reply layer
//! only sees [`ReplyProvider`]; which backend sits behind it is decided by
//! configuration.

mod gemini;
mod groq;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::ProviderError;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;

/// A single-shot text generation capability
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Short provider name used in logs and `/health`
    fn name(&self) -> &str;

    /// Generate a reply for `prompt`. The returned text is untrimmed and may be empty.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the configured provider, or `None` when no API key is set (echo mode)
pub fn build_provider(config: &LlmConfig) -> Option<Arc<dyn ReplyProvider>> {
    let api_key = config.api_key.as_deref()?;

    info!(
        "Using {} provider with model {}",
        config.provider,
        config.model()
    );

    let provider: Arc<dyn ReplyProvider> = match config.provider {
        LlmProvider::Groq => Arc::new(GroqProvider::new(
            api_key,
            config.model(),
            config.base_url(),
            config.system_prompt(),
        )),
        LlmProvider::Gemini => Arc::new(GeminiProvider::new(
            api_key,
            config.model(),
            config.base_url(),
            config.system_prompt(),
        )),
    };

    Some(provider)
}
