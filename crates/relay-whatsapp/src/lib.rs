//! relay-whatsapp: WhatsApp Cloud API webhook relay
//!
//! Receives callback events from the WhatsApp Business Platform, answers the
//! first text message through [`relay_core::ReplyGenerator`], and sends the
//! reply back through the Graph API.

pub mod api;
pub mod bot;
pub mod error;
pub mod handler;
pub mod types;
pub mod webhook;

pub use api::WhatsAppApi;
pub use bot::WhatsAppBot;
pub use error::{Result, WhatsAppError};
pub use handler::{EventHandler, EventOutcome};
pub use types::WebhookPayload;
pub use webhook::{ACK_BODY, create_webhook_router, start_webhook_server};
