//! WhatsApp relay wrapper

use std::future::Future;
use std::sync::Arc;

use relay_core::{Config, ReplyGenerator};

use crate::api::WhatsAppApi;
use crate::error::Result;
use crate::handler::EventHandler;
use crate::webhook::start_webhook_server;

/// Wires configuration into a runnable webhook server
pub struct WhatsAppBot {
    handler: Arc<EventHandler>,
    addr: String,
}

impl WhatsAppBot {
    /// Build the API client, reply generator and handler from configuration
    pub fn new(config: &Config) -> Self {
        let api = WhatsAppApi::new(&config.whatsapp);
        let replies = ReplyGenerator::from_config(&config.llm);
        let handler = EventHandler::new(api, replies)
            .with_unsupported_message_reply(config.whatsapp.unsupported_message_reply.clone());

        Self {
            handler: Arc::new(handler),
            addr: config.listen_addr(),
        }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        start_webhook_server(self.handler, &self.addr, shutdown).await
    }

    pub fn handler(&self) -> Arc<EventHandler> {
        Arc::clone(&self.handler)
    }

    /// Listen address, `host:port`
    pub fn addr(&self) -> &str {
        &self.addr
    }
}
