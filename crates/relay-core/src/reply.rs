//! Reply generation policy
//!
//! Turns user text into the text that goes back to WhatsApp. This layer
//! never fails: without a provider it echoes, on a provider error it
//! apologises.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::provider::{ReplyProvider, build_provider};

/// Sent when the provider call fails
pub const APOLOGY_REPLY: &str = "Sorry, I couldn't process that. Please try again.";

/// Wraps the optional provider with the echo/apology fallbacks
#[derive(Clone, Default)]
pub struct ReplyGenerator {
    provider: Option<Arc<dyn ReplyProvider>>,
}

impl ReplyGenerator {
    pub fn new(provider: Option<Arc<dyn ReplyProvider>>) -> Self {
        Self { provider }
    }

    /// Echo-only generator
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let provider = build_provider(config);
        if provider.is_none() {
            warn!(
                "{} missing; replies will fall back to echo",
                config.provider.api_key_env()
            );
        }
        Self::new(provider)
    }

    /// Name of the active provider, `"echo"` when none is configured
    pub fn mode(&self) -> &str {
        self.provider.as_ref().map_or("echo", |p| p.name())
    }

    pub async fn generate_reply(&self, user_text: &str) -> String {
        let Some(provider) = &self.provider else {
            return echo_reply(user_text);
        };

        match provider.generate(user_text).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    info!("{} returned an empty reply; echoing", provider.name());
                    echo_reply(user_text)
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                warn!("{} error: {}", provider.name(), e);
                APOLOGY_REPLY.to_string()
            }
        }
    }
}

fn echo_reply(user_text: &str) -> String {
    format!("Echo: {}", user_text)
}
