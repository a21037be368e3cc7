//! Outgoing client events and the encode half of the wire codec.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SessionConfig;
use crate::item::ConversationItem;

/// Per-response overrides carried by `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseOverrides {
    /// Modalities for this response only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<crate::config::Modality>>,
    /// Instructions for this response only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Caller metadata echoed on the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Outgoing wire event.
///
/// Each structured variant carries an optional `event_id` correlation field;
/// [`ClientEvent::Raw`] passes a pre-built envelope through verbatim
/// (including any `event_id` the caller put inside it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Replace the session configuration.
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Caller-chosen correlation id.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        /// The new configuration.
        session: SessionConfig,
    },
    /// Ask the model to generate a response.
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Caller-chosen correlation id.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        /// Per-response overrides.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseOverrides>,
    },
    /// Insert an item into the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Caller-chosen correlation id.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        /// Insert after this item; appends when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        /// The item to insert.
        item: ConversationItem,
    },
    /// Append audio to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend {
        /// Caller-chosen correlation id.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        /// Base64-encoded audio in the session's input format.
        audio: String,
    },
    /// Commit the input buffer as a user turn.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioCommit {
        /// Caller-chosen correlation id.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    /// Pre-built envelope sent verbatim, for wire events this crate does not
    /// model. Must contain its own `type` field.
    #[serde(untagged)]
    Raw(Value),
}

impl ClientEvent {
    /// Encode to the wire JSON envelope.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire discriminator of this event, for logging.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ResponseCreate { .. } => "response.create",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::InputAudioAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioCommit { .. } => "input_audio_buffer.commit",
            Self::Raw(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("raw"),
        }
    }

    /// A `conversation.item.create` holding a user text message.
    #[must_use]
    pub fn user_message(text: &str) -> Self {
        Self::ConversationItemCreate {
            event_id: None,
            previous_item_id: None,
            item: ConversationItem::user_text(text),
        }
    }

    /// An `input_audio_buffer.append` from raw audio bytes (base64-encoded
    /// here; the bytes must already be in the session's input format).
    #[must_use]
    pub fn append_audio(audio: &[u8]) -> Self {
        Self::InputAudioAppend {
            event_id: None,
            audio: base64::engine::general_purpose::STANDARD.encode(audio),
        }
    }

    /// An `input_audio_buffer.commit`.
    #[must_use]
    pub fn commit_audio() -> Self {
        Self::InputAudioCommit { event_id: None }
    }

    /// A bare `response.create`.
    #[must_use]
    pub fn create_response() -> Self {
        Self::ResponseCreate {
            event_id: None,
            response: None,
        }
    }

    /// Attach a caller-chosen correlation id to a structured event.
    ///
    /// No-op on [`ClientEvent::Raw`] — a raw envelope owns its own fields.
    #[must_use]
    pub fn with_event_id(mut self, id: &str) -> Self {
        match &mut self {
            Self::SessionUpdate { event_id, .. }
            | Self::ResponseCreate { event_id, .. }
            | Self::ConversationItemCreate { event_id, .. }
            | Self::InputAudioAppend { event_id, .. }
            | Self::InputAudioCommit { event_id } => *event_id = Some(id.to_owned()),
            Self::Raw(_) => {}
        }
        self
    }

    /// Attach a freshly generated (UUIDv7) correlation id.
    #[must_use]
    pub fn with_new_event_id(self) -> Self {
        let id = uuid::Uuid::now_v7().to_string();
        self.with_event_id(&id)
    }
}
