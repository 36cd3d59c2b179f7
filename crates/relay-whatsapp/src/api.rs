//! WhatsApp Cloud API client

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use relay_core::WhatsAppConfig;

use crate::error::{Result, WhatsAppError};

/// Graph API client bound to one sender phone number
#[derive(Clone)]
pub struct WhatsAppApi {
    client: Client,
    access_token: String,
    verify_token: Option<String>,
    messages_url: String,
}

impl WhatsAppApi {
    pub fn new(config: &WhatsAppConfig) -> Self {
        let messages_url = format!(
            "{}/{}/{}/messages",
            config.graph_base_url.trim_end_matches('/'),
            config.graph_api_version,
            config.phone_number_id
        );

        Self {
            client: Client::new(),
            access_token: config.access_token.clone(),
            verify_token: config.verify_token.clone(),
            messages_url,
        }
    }

    /// Send endpoint for the configured phone number
    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// Send a text message and return the Graph API's JSON response
    ///
    /// A non-2xx status is logged but still returned as the parsed body;
    /// only transport failures and non-JSON bodies are errors.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<serde_json::Value> {
        let payload = SendMessagePayload {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextPayload { body },
        };

        debug!("Sending message to {} via {}", to, self.messages_url);

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            info!("Reply status: {} {}", status.as_u16(), text);
        } else {
            warn!("Reply status: {} {}", status.as_u16(), text);
        }

        serde_json::from_str(&text)
            .map_err(|e| WhatsAppError::InvalidResponse(format!("{} - {}", e, text)))
    }

    /// Check the verification handshake and hand back the challenge
    pub fn verify_webhook(&self, token: Option<&str>, challenge: Option<&str>) -> Result<String> {
        match (self.verify_token.as_deref(), token) {
            (Some(expected), Some(given)) if expected == given => {
                info!("Webhook verified successfully");
                Ok(challenge.unwrap_or_default().to_string())
            }
            (None, _) => {
                error!("Webhook verification attempted but VERIFY_TOKEN is not configured");
                Err(WhatsAppError::WebhookVerificationFailed)
            }
            _ => {
                error!("Webhook verification failed: invalid token");
                Err(WhatsAppError::WebhookVerificationFailed)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text: TextPayload<'a>,
}

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    body: &'a str,
}
