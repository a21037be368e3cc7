//! Conversation items — the units of conversation state on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A user/assistant/system message.
    Message,
    /// A model-issued function call.
    FunctionCall,
    /// Caller-supplied output for a function call.
    FunctionCallOutput,
    /// Item kind added to the wire after this code was written.
    #[serde(other)]
    Unknown,
}

/// Role of a message item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// One content part of a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// Caller-supplied text.
    #[serde(rename = "input_text")]
    InputText {
        /// The text.
        text: String,
    },
    /// Caller-supplied audio.
    #[serde(rename = "input_audio")]
    InputAudio {
        /// Base64-encoded audio, absent on echoes.
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        /// Transcript, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    /// Model text output.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// Model audio output.
    #[serde(rename = "audio")]
    Audio {
        /// Base64-encoded audio, usually delivered via deltas instead.
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        /// Transcript of the audio.
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    /// Content kind this crate does not model; preserved verbatim.
    #[serde(untagged)]
    Other(Value),
}

/// A conversation item, both as created by the caller and as echoed by the
/// server inside item and response lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item id; assigned by the server when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item kind.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Role, for message items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ItemRole>,
    /// Lifecycle status (`in_progress`, `completed`, …), server-set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Message content parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Correlation id, for function-call items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name, for function-call items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// JSON-encoded arguments, for function-call items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function result, for function-call-output items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Fields this crate does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ConversationItem {
    /// A user message item holding a single text part.
    #[must_use]
    pub fn user_text(text: &str) -> Self {
        Self {
            id: None,
            kind: ItemKind::Message,
            role: Some(ItemRole::User),
            status: None,
            content: Some(vec![ContentPart::InputText {
                text: text.to_owned(),
            }]),
            call_id: None,
            name: None,
            arguments: None,
            output: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A function-call-output item answering the call identified by `call_id`.
    #[must_use]
    pub fn function_output(call_id: &str, output: &str) -> Self {
        Self {
            id: None,
            kind: ItemKind::FunctionCallOutput,
            role: None,
            status: None,
            content: None,
            call_id: Some(call_id.to_owned()),
            name: None,
            arguments: None,
            output: Some(output.to_owned()),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_text_wire_shape() {
        let value = serde_json::to_value(ConversationItem::user_text("hello")).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "message",
                "role": "user",
                "content": [{"type": "input_text", "text": "hello"}],
            })
        );
    }

    #[test]
    fn function_output_wire_shape() {
        let value =
            serde_json::to_value(ConversationItem::function_output("call_1", "{\"ok\":true}"))
                .unwrap();
        assert_eq!(value["type"], "function_call_output");
        assert_eq!(value["call_id"], "call_1");
        assert_eq!(value["output"], "{\"ok\":true}");
    }

    #[test]
    fn unknown_item_kind_tolerated() {
        let item: ConversationItem = serde_json::from_value(json!({
            "type": "mcp_call",
            "id": "item_9",
            "server_label": "docs",
        }))
        .unwrap();
        assert_eq!(item.kind, ItemKind::Unknown);
        assert_eq!(item.extra["server_label"], "docs");
    }

    #[test]
    fn unknown_content_part_preserved() {
        let parts: Vec<ContentPart> = serde_json::from_value(json!([
            {"type": "text", "text": "hi"},
            {"type": "refusal", "refusal": "no"},
        ]))
        .unwrap();
        assert_eq!(parts[0], ContentPart::Text { text: "hi".into() });
        assert_eq!(
            parts[1],
            ContentPart::Other(json!({"type": "refusal", "refusal": "no"}))
        );
    }
}
