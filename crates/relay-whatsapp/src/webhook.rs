//! Webhook server for the WhatsApp Cloud API
//!
//! `GET /webhook` answers the verification handshake. `POST /webhook`
//! ingests callbacks and always acknowledges with `200 EVENT_RECEIVED`: the
//! platform redelivers anything it considers failed, so processing errors
//! stop at this boundary and only reach the logs.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WhatsAppError};
use crate::handler::EventHandler;
use crate::types::WebhookPayload;

/// Body of every POST acknowledgment
pub const ACK_BODY: &str = "EVENT_RECEIVED";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub handler: Arc<EventHandler>,
}

/// Verification handshake query
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Create webhook router
pub fn create_webhook_router(handler: Arc<EventHandler>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(WebhookState { handler })
}

async fn verify_webhook(
    State(state): State<WebhookState>,
    query: std::result::Result<Query<VerifyQuery>, QueryRejection>,
) -> Response {
    let Ok(Query(query)) = query.inspect_err(|e| warn!("Rejecting verification request: {}", e)) else {
        return (StatusCode::FORBIDDEN, "Invalid verification token").into_response();
    };
    debug!("Verification request: mode={:?}", query.mode);

    match state
        .handler
        .api()
        .verify_webhook(query.verify_token.as_deref(), query.challenge.as_deref())
    {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(_) => (StatusCode::FORBIDDEN, "Invalid verification token").into_response(),
    }
}

async fn receive_webhook(
    State(state): State<WebhookState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> (StatusCode, &'static str) {
    // An unreadable or oversized body is acknowledged like an empty one
    let body = body
        .inspect_err(|e| warn!("Failed to read webhook body: {}", e))
        .unwrap_or_default();
    debug!("Incoming: {}", String::from_utf8_lossy(&body));

    let payload = WebhookPayload::parse(&body);

    match state.handler.handle_event(&payload).await {
        Ok(outcome) => debug!("Webhook processed: {:?}", outcome),
        Err(e) => error!("Error processing webhook: {}", e),
    }

    (StatusCode::OK, ACK_BODY)
}

async fn health(State(state): State<WebhookState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.handler.reply_mode(),
    }))
}

/// Serve the webhook until `shutdown` resolves
pub async fn start_webhook_server<F>(handler: Arc<EventHandler>, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_webhook_router(handler);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WhatsAppError::Server(format!("Failed to bind {}: {}", addr, e)))?;

    info!("WhatsApp webhook server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WhatsAppError::Server(e.to_string()))?;

    warn!("WhatsApp webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WhatsAppApi;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use relay_core::{APOLOGY_REPLY, GroqProvider, ProviderError, ReplyGenerator, ReplyProvider, WhatsAppConfig};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GRAPH_PATH: &str = "/v21.0/106540352242922/messages";

    struct BlankProvider;

    #[async_trait]
    impl ReplyProvider for BlankProvider {
        fn name(&self) -> &str {
            "blank"
        }

        async fn generate(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
            Ok("  \n ".to_string())
        }
    }

    fn router(graph: &MockServer, replies: ReplyGenerator) -> Router {
        let config = WhatsAppConfig {
            access_token: "EAAG-test".to_string(),
            phone_number_id: "106540352242922".to_string(),
            verify_token: Some("verify-me".to_string()),
            graph_base_url: graph.uri(),
            ..Default::default()
        };
        let handler = EventHandler::new(WhatsAppApi::new(&config), replies);
        create_webhook_router(Arc::new(handler))
    }

    /// Expect exactly `times` sends, optionally with a given body text
    async fn expect_sends(graph: &MockServer, body: Option<&str>, times: u64) {
        let mut mock = Mock::given(method("POST")).and(path(GRAPH_PATH));
        if let Some(body) = body {
            mock = mock.and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "16505551234",
                "type": "text",
                "text": {"body": body}
            })));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"id": "wamid.out"}]
        })))
        .expect(times)
        .mount(graph)
        .await;
    }

    fn text_message(body: &str) -> String {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "messages": [{
                    "from": "16505551234",
                    "id": "wamid.in",
                    "timestamp": "1749416383",
                    "type": "text",
                    "text": {"body": body}
                }]
            }}]}]
        })
        .to_string()
    }

    async fn post(app: Router, body: impl Into<Body>) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        send(app, request).await
    }

    async fn get_uri(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, request).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_verify_with_matching_token_returns_challenge() {
        let graph = MockServer::start().await;
        let app = router(&graph, ReplyGenerator::echo());

        let (status, body) = get_uri(
            app,
            "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");
    }

    #[tokio::test]
    async fn test_verify_with_wrong_token_is_forbidden() {
        let graph = MockServer::start().await;

        let (status, body) = get_uri(
            router(&graph, ReplyGenerator::echo()),
            "/webhook?hub.verify_token=nope&hub.challenge=1158201444",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Invalid verification token");

        let (status, _) = get_uri(router(&graph, ReplyGenerator::echo()), "/webhook").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unparseable_verify_query_is_forbidden() {
        let graph = MockServer::start().await;

        let (status, body) = get_uri(
            router(&graph, ReplyGenerator::echo()),
            "/webhook?hub.verify_token=verify-me&hub.verify_token=other&hub.challenge=1158201444",
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Invalid verification token");
    }

    #[tokio::test]
    async fn test_text_message_without_provider_is_echoed() {
        let graph = MockServer::start().await;
        expect_sends(&graph, Some("Echo: Does it come in another color?"), 1).await;

        let (status, body) = post(
            router(&graph, ReplyGenerator::echo()),
            text_message("Does it come in another color?"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK_BODY);
    }

    #[tokio::test]
    async fn test_provider_failure_sends_apology() {
        let graph = MockServer::start().await;
        expect_sends(&graph, Some(APOLOGY_REPLY), 1).await;

        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&llm)
            .await;

        let provider: Arc<dyn ReplyProvider> =
            Arc::new(GroqProvider::new("gsk_test", "openai/gpt-oss-20b", llm.uri(), "Be brief."));
        let app = router(&graph, ReplyGenerator::new(Some(provider)));

        let (status, body) = post(app, text_message("hello")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK_BODY);
    }

    #[tokio::test]
    async fn test_provider_reply_is_forwarded() {
        let graph = MockServer::start().await;
        expect_sends(&graph, Some("Yes, it comes in blue."), 1).await;

        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "\nYes, it comes in blue.\n"}}]
            })))
            .mount(&llm)
            .await;

        let provider: Arc<dyn ReplyProvider> =
            Arc::new(GroqProvider::new("gsk_test", "openai/gpt-oss-20b", llm.uri(), "Be brief."));
        let app = router(&graph, ReplyGenerator::new(Some(provider)));

        let (status, _) = post(app, text_message("Does it come in another color?")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blank_provider_reply_falls_back_to_echo() {
        let graph = MockServer::start().await;
        expect_sends(&graph, Some("Echo: hello"), 1).await;

        let provider: Arc<dyn ReplyProvider> = Arc::new(BlankProvider);
        let app = router(&graph, ReplyGenerator::new(Some(provider)));

        let (status, body) = post(app, text_message("hello")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK_BODY);
    }

    #[tokio::test]
    async fn test_payloads_without_messages_send_nothing() {
        let graph = MockServer::start().await;
        expect_sends(&graph, None, 0).await;

        let bodies = [
            json!({}),
            json!({"object": "whatsapp_business_account"}),
            json!({"entry": []}),
            json!({"entry": [{"id": "1"}]}),
            json!({"entry": [{"changes": [{"field": "messages"}]}]}),
            json!({"entry": [{"changes": [{"value": {"messaging_product": "whatsapp"}}]}]}),
        ];

        for body in bodies {
            let (status, ack) = post(router(&graph, ReplyGenerator::echo()), body.to_string()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ack, ACK_BODY);
        }
    }

    #[tokio::test]
    async fn test_statuses_only_payload_sends_nothing() {
        let graph = MockServer::start().await;
        expect_sends(&graph, None, 0).await;

        let body = json!({"entry": [{"changes": [{"value": {"statuses": [{
            "id": "wamid.out",
            "recipient_id": "16505551234",
            "status": "delivered",
            "timestamp": "1749416390"
        }]}}]}]});

        let (status, ack) = post(router(&graph, ReplyGenerator::echo()), body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, ACK_BODY);
    }

    #[tokio::test]
    async fn test_malformed_body_is_acknowledged() {
        let graph = MockServer::start().await;
        expect_sends(&graph, None, 0).await;

        for body in ["", "{not json", "null"] {
            let (status, ack) = post(router(&graph, ReplyGenerator::echo()), body.to_string()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ack, ACK_BODY);
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_acknowledged() {
        let graph = MockServer::start().await;
        expect_sends(&graph, None, 0).await;

        let body = text_message(&"a".repeat(3 * 1024 * 1024));
        let (status, ack) = post(router(&graph, ReplyGenerator::echo()), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, ACK_BODY);
    }

    #[tokio::test]
    async fn test_mistyped_metadata_does_not_drop_message() {
        let graph = MockServer::start().await;
        expect_sends(&graph, Some("Echo: hi"), 1).await;

        let body = json!({"entry": [{"changes": [{"value": {
            "contacts": [{"wa_id": 16505551234_u64}],
            "messages": [{
                "from": "16505551234",
                "timestamp": 1749416383,
                "type": "text",
                "text": {"body": "hi"}
            }]
        }}]}]});

        let (status, ack) = post(router(&graph, ReplyGenerator::echo()), body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, ACK_BODY);
    }

    #[tokio::test]
    async fn test_graph_failure_still_acknowledged() {
        let graph = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GRAPH_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(1)
            .mount(&graph)
            .await;

        let (status, ack) = post(router(&graph, ReplyGenerator::echo()), text_message("hello")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, ACK_BODY);
    }

    #[tokio::test]
    async fn test_health_reports_reply_mode() {
        let graph = MockServer::start().await;

        let (status, body) = get_uri(router(&graph, ReplyGenerator::echo()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["provider"], "echo");
    }
}
