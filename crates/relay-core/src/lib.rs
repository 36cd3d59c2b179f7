//! relay-core: shared pieces of the WhatsApp relay
//!
//! Configuration, error types, and the reply generation layer that sits
//! between an inbound message and the text-generation provider.

pub mod config;
pub mod error;
pub mod provider;
pub mod reply;

pub use config::{Config, LlmConfig, LlmProvider, ServerConfig, WhatsAppConfig};
pub use error::{Error, ProviderError, Result};
pub use provider::{GeminiProvider, GroqProvider, ReplyProvider, build_provider};
pub use reply::{APOLOGY_REPLY, ReplyGenerator};
