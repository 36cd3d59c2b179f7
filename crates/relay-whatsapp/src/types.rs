//! WhatsApp Cloud API callback payloads
//!
//! Only the fields the relay reads are modelled. Every field is optional, and
//! a node of the wrong JSON type reads as absent without affecting its
//! siblings, so a partial or unexpected payload means "nothing to do"
//! instead of failing.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

/// Top-level callback body
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "lenient_list")]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default, deserialize_with = "lenient_list")]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "lenient")]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default, deserialize_with = "lenient_list")]
    pub messages: Vec<InboundMessage>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub statuses: Vec<StatusUpdate>,
}

/// An inbound user message
#[derive(Debug, Default, Deserialize)]
pub struct InboundMessage {
    /// Sender's WhatsApp id
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<String>,
    /// `text`, `image`, `sticker`, ...
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<TextBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<String>,
}

/// Delivery status of a message we sent
#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recipient_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

impl WebhookPayload {
    /// Parse a request body. Anything that is not a well-formed callback
    /// becomes an empty payload.
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Treating unparseable webhook body as empty: {}", e);
                Self::default()
            }
        }
    }

    /// The message the relay acts on: `messages[0]` of the first change, in
    /// entry then change order, that carries any messages. Changes with an
    /// empty `messages` list (status callbacks) are skipped rather than ending
    /// the search at the first change.
    pub fn first_message(&self) -> Option<&InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .find_map(|change| change.value.messages.first())
    }

    /// The first status update of every change
    pub fn statuses(&self) -> impl Iterator<Item = &StatusUpdate> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .filter_map(|change| change.value.statuses.first())
    }
}

impl InboundMessage {
    /// Text body, if this is a text message with non-empty content
    pub fn text_body(&self) -> Option<&str> {
        self.text
            .as_ref()
            .and_then(|t| t.body.as_deref())
            .filter(|body| !body.is_empty())
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("unknown")
    }
}

/// Read a node as `T`, falling back to the default for `null` or a mistyped value
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Read a list element by element. A list of the wrong type is empty and a
/// mistyped element keeps its slot as a default value.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .map(|item| T::deserialize(item).unwrap_or_default())
        .collect())
}
