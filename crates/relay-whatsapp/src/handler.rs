//! Inbound event handling
//!
//! One callback produces at most one outbound message.

use tracing::{debug, info, warn};

use relay_core::ReplyGenerator;

use crate::api::WhatsAppApi;
use crate::error::Result;
use crate::types::WebhookPayload;

/// What happened to a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A reply was sent to this sender
    Replied { to: String },
    /// The first message had no text body and no fallback reply is configured
    SkippedNonText,
    /// The first message had no sender id
    SkippedNoSender,
    /// No message in the payload (status updates only, or empty)
    NoMessage,
}

/// Turns callbacks into replies
pub struct EventHandler {
    api: WhatsAppApi,
    replies: ReplyGenerator,
    unsupported_message_reply: Option<String>,
}

impl EventHandler {
    pub fn new(api: WhatsAppApi, replies: ReplyGenerator) -> Self {
        Self {
            api,
            replies,
            unsupported_message_reply: None,
        }
    }

    /// Reply with fixed text to messages that carry no text body
    pub fn with_unsupported_message_reply(mut self, reply: Option<String>) -> Self {
        self.unsupported_message_reply = reply;
        self
    }

    pub fn api(&self) -> &WhatsAppApi {
        &self.api
    }

    /// Provider name, or `"echo"`
    pub fn reply_mode(&self) -> &str {
        self.replies.mode()
    }

    /// Process one callback. Only Graph API failures surface as errors.
    pub async fn handle_event(&self, payload: &WebhookPayload) -> Result<EventOutcome> {
        for status in payload.statuses() {
            info!(
                "Message {} to {} is now {}",
                status.id.as_deref().unwrap_or("?"),
                status.recipient_id.as_deref().unwrap_or("?"),
                status.status.as_deref().unwrap_or("?")
            );
        }

        let Some(message) = payload.first_message() else {
            debug!("No message in webhook payload");
            return Ok(EventOutcome::NoMessage);
        };

        let Some(sender) = message.from.as_deref().filter(|s| !s.is_empty()) else {
            warn!("Incoming {} message without sender id. Skipping.", message.kind());
            return Ok(EventOutcome::SkippedNoSender);
        };

        let reply = match message.text_body() {
            Some(text) => {
                info!("User {} said: {}", sender, text);
                self.replies.generate_reply(text).await
            }
            None => match &self.unsupported_message_reply {
                Some(reply) => {
                    info!(
                        "Incoming {} message from {} without text payload. Sending fallback reply.",
                        message.kind(),
                        sender
                    );
                    reply.clone()
                }
                None => {
                    info!(
                        "Incoming {} message from {} without text payload. Skipping reply.",
                        message.kind(),
                        sender
                    );
                    return Ok(EventOutcome::SkippedNonText);
                }
            },
        };

        self.api.send_text(sender, &reply).await?;

        Ok(EventOutcome::Replied {
            to: sender.to_string(),
        })
    }
}
