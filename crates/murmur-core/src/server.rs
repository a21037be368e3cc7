//! Incoming server events and the classifier.
//!
//! The wire discriminator set is open: the service adds event types over
//! time. Classification therefore never fails — anything outside the table
//! below, or anything malformed under a known discriminator, comes out as
//! [`ServerEvent::Opaque`] carrying the original payload.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::RemoteSession;
use crate::item::ConversationItem;

/// Error body carried by `error` and `*.failed` events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Machine-readable code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Offending parameter, if any.
    pub param: Option<String>,
    /// Client event that triggered the error, if any.
    pub event_id: Option<String>,
}

/// Response body carried by `response.created` / `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseBody {
    /// Server-assigned response id.
    pub id: Option<String>,
    /// Lifecycle status.
    pub status: Option<String>,
    /// Output items, populated on `response.done`.
    pub output: Option<Vec<ConversationItem>>,
    /// Token usage, populated on `response.done`.
    pub usage: Option<Value>,
    /// Fields this crate does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Incoming wire event, classified by its `type` discriminator.
///
/// The `#[serde(tag = "type")]` renames below are the single decode table;
/// adding a variant means adding it here and to [`KNOWN_TYPES`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Server-reported error; the session stays open unless the transport
    /// closes afterward.
    #[serde(rename = "error")]
    Error { event_id: Option<String>, error: ErrorBody },

    /// Initial session echo after connect.
    #[serde(rename = "session.created")]
    SessionCreated { event_id: Option<String>, session: RemoteSession },
    /// Session echo after a `session.update`.
    #[serde(rename = "session.updated")]
    SessionUpdated { event_id: Option<String>, session: RemoteSession },

    /// Item entered the conversation.
    #[serde(rename = "conversation.item.added")]
    ItemAdded {
        event_id: Option<String>,
        previous_item_id: Option<String>,
        item: ConversationItem,
    },
    /// Item finished (all content final).
    #[serde(rename = "conversation.item.done")]
    ItemDone {
        event_id: Option<String>,
        previous_item_id: Option<String>,
        item: ConversationItem,
    },

    /// Incremental input transcription.
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        event_id: Option<String>,
        item_id: Option<String>,
        content_index: Option<u32>,
        delta: String,
    },
    /// Final input transcription for an item.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        event_id: Option<String>,
        item_id: Option<String>,
        content_index: Option<u32>,
        transcript: String,
    },
    /// Input transcription failed; the item itself survives.
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputTranscriptionFailed {
        event_id: Option<String>,
        item_id: Option<String>,
        content_index: Option<u32>,
        error: ErrorBody,
    },

    /// Input buffer committed as a user turn.
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioCommitted {
        event_id: Option<String>,
        previous_item_id: Option<String>,
        item_id: Option<String>,
    },
    /// Server VAD detected start of speech.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        event_id: Option<String>,
        audio_start_ms: Option<u64>,
        item_id: Option<String>,
    },
    /// Server VAD detected end of speech.
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        event_id: Option<String>,
        audio_end_ms: Option<u64>,
        item_id: Option<String>,
    },

    /// Response generation started.
    #[serde(rename = "response.created")]
    ResponseCreated { event_id: Option<String>, response: ResponseBody },
    /// Response generation finished; carries the aggregated output.
    #[serde(rename = "response.done")]
    ResponseDone { event_id: Option<String>, response: ResponseBody },

    /// New output item within a response.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        event_id: Option<String>,
        response_id: Option<String>,
        output_index: Option<u32>,
        item: ConversationItem,
    },
    /// Output item finalized.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        event_id: Option<String>,
        response_id: Option<String>,
        output_index: Option<u32>,
        item: ConversationItem,
    },

    /// Incremental text output.
    #[serde(rename = "response.output_text.delta")]
    TextDelta {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
        delta: String,
    },
    /// Final text for one content part.
    #[serde(rename = "response.output_text.done")]
    TextDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
        text: String,
    },

    /// Incremental audio output (base64).
    #[serde(rename = "response.output_audio.delta")]
    AudioDelta {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
        delta: String,
    },
    /// Audio output finished for one content part.
    #[serde(rename = "response.output_audio.done")]
    AudioDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
    },

    /// Incremental transcript of audio output.
    #[serde(rename = "response.output_audio_transcript.delta")]
    AudioTranscriptDelta {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
        delta: String,
    },
    /// Final transcript of audio output.
    #[serde(rename = "response.output_audio_transcript.done")]
    AudioTranscriptDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
        content_index: Option<u32>,
        transcript: String,
    },

    /// Remote tool call started.
    #[serde(rename = "response.mcp_call.in_progress")]
    ToolCallInProgress {
        event_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
    },
    /// Remote tool call succeeded.
    #[serde(rename = "response.mcp_call.completed")]
    ToolCallCompleted {
        event_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
    },
    /// Remote tool call failed.
    #[serde(rename = "response.mcp_call.failed")]
    ToolCallFailed {
        event_id: Option<String>,
        item_id: Option<String>,
        output_index: Option<u32>,
    },

    /// Remote tool listing started.
    #[serde(rename = "mcp_list_tools.in_progress")]
    ToolListInProgress { event_id: Option<String>, item_id: Option<String> },
    /// Remote tool listing succeeded.
    #[serde(rename = "mcp_list_tools.completed")]
    ToolListCompleted { event_id: Option<String>, item_id: Option<String> },
    /// Remote tool listing failed.
    #[serde(rename = "mcp_list_tools.failed")]
    ToolListFailed { event_id: Option<String>, item_id: Option<String> },

    /// Anything outside the table above, or a malformed payload under a
    /// known discriminator. Carries the full decoded envelope.
    #[serde(skip)]
    Opaque {
        /// The wire discriminator (empty if the envelope had none).
        event_type: String,
        /// The decoded envelope, verbatim.
        payload: Value,
    },
}

/// Discriminators the decode table recognizes, in table order.
///
/// Kept in lockstep with the `#[serde(rename)]` attributes on
/// [`ServerEvent`]; `known_types_classify_non_opaque` in the tests enforces
/// the pairing.
pub const KNOWN_TYPES: &[&str] = &[
    "error",
    "session.created",
    "session.updated",
    "conversation.item.added",
    "conversation.item.done",
    "conversation.item.input_audio_transcription.delta",
    "conversation.item.input_audio_transcription.completed",
    "conversation.item.input_audio_transcription.failed",
    "input_audio_buffer.committed",
    "input_audio_buffer.speech_started",
    "input_audio_buffer.speech_stopped",
    "response.created",
    "response.done",
    "response.output_item.added",
    "response.output_item.done",
    "response.output_text.delta",
    "response.output_text.done",
    "response.output_audio.delta",
    "response.output_audio.done",
    "response.output_audio_transcript.delta",
    "response.output_audio_transcript.done",
    "response.mcp_call.in_progress",
    "response.mcp_call.completed",
    "response.mcp_call.failed",
    "mcp_list_tools.in_progress",
    "mcp_list_tools.completed",
    "mcp_list_tools.failed",
];

impl ServerEvent {
    /// Wire discriminator of this event.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::ItemAdded { .. } => "conversation.item.added",
            Self::ItemDone { .. } => "conversation.item.done",
            Self::InputTranscriptionDelta { .. } => {
                "conversation.item.input_audio_transcription.delta"
            }
            Self::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::InputAudioCommitted { .. } => "input_audio_buffer.committed",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::OutputItemDone { .. } => "response.output_item.done",
            Self::TextDelta { .. } => "response.output_text.delta",
            Self::TextDone { .. } => "response.output_text.done",
            Self::AudioDelta { .. } => "response.output_audio.delta",
            Self::AudioDone { .. } => "response.output_audio.done",
            Self::AudioTranscriptDelta { .. } => "response.output_audio_transcript.delta",
            Self::AudioTranscriptDone { .. } => "response.output_audio_transcript.done",
            Self::ToolCallInProgress { .. } => "response.mcp_call.in_progress",
            Self::ToolCallCompleted { .. } => "response.mcp_call.completed",
            Self::ToolCallFailed { .. } => "response.mcp_call.failed",
            Self::ToolListInProgress { .. } => "mcp_list_tools.in_progress",
            Self::ToolListCompleted { .. } => "mcp_list_tools.completed",
            Self::ToolListFailed { .. } => "mcp_list_tools.failed",
            Self::Opaque { event_type, .. } => event_type,
        }
    }
}

/// Classify one complete wire message into a [`ServerEvent`].
///
/// Total: never errors, never drops. Undecodable input and unrecognized or
/// malformed envelopes all land in [`ServerEvent::Opaque`].
#[must_use]
pub fn classify(text: &str) -> ServerEvent {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("undecodable wire message: {e}");
            return ServerEvent::Opaque {
                event_type: String::new(),
                payload: Value::String(text.to_owned()),
            };
        }
    };
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    if !KNOWN_TYPES.contains(&event_type.as_str()) {
        return ServerEvent::Opaque {
            event_type,
            payload: value,
        };
    }
    match serde_json::from_value::<ServerEvent>(value.clone()) {
        Ok(event) => event,
        Err(e) => {
            warn!(%event_type, "malformed payload for known event type: {e}");
            ServerEvent::Opaque {
                event_type,
                payload: value,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_text_delta() {
        let event = classify(
            r#"{"type":"response.output_text.delta","response_id":"resp_1","item_id":"item_1","output_index":0,"content_index":0,"delta":"Hel"}"#,
        );
        let ServerEvent::TextDelta {
            response_id, delta, ..
        } = event
        else {
            panic!("wrong variant: {event:?}");
        };
        assert_eq!(response_id.as_deref(), Some("resp_1"));
        assert_eq!(delta, "Hel");
    }

    #[test]
    fn classifies_response_done_with_output() {
        let event = classify(
            &json!({
                "type": "response.done",
                "response": {
                    "id": "resp_1",
                    "status": "completed",
                    "output": [{"type": "message", "role": "assistant",
                                "content": [{"type": "text", "text": "hi"}]}],
                    "usage": {"total_tokens": 9},
                },
            })
            .to_string(),
        );
        let ServerEvent::ResponseDone { response, .. } = event else {
            panic!("wrong variant: {event:?}");
        };
        assert_eq!(response.id.as_deref(), Some("resp_1"));
        assert_eq!(response.output.unwrap().len(), 1);
    }

    #[test]
    fn unknown_discriminator_becomes_opaque_with_full_payload() {
        let payload = json!({"type": "rate_limits.updated", "rate_limits": [{"name": "requests"}]});
        let event = classify(&payload.to_string());
        assert_eq!(
            event,
            ServerEvent::Opaque {
                event_type: "rate_limits.updated".to_owned(),
                payload,
            }
        );
    }

    #[test]
    fn malformed_known_type_downgrades_to_opaque() {
        // delta must be a string.
        let payload = json!({"type": "response.output_text.delta", "delta": 7});
        let event = classify(&payload.to_string());
        assert_eq!(event.event_type(), "response.output_text.delta");
        assert!(matches!(event, ServerEvent::Opaque { .. }));
    }

    #[test]
    fn undecodable_input_becomes_opaque() {
        let event = classify("not json at all");
        let ServerEvent::Opaque {
            event_type,
            payload,
        } = event
        else {
            panic!("expected opaque");
        };
        assert!(event_type.is_empty());
        assert_eq!(payload, Value::String("not json at all".into()));
    }

    #[test]
    fn envelope_without_type_becomes_opaque() {
        let event = classify(r#"{"delta":"x"}"#);
        assert!(matches!(event, ServerEvent::Opaque { event_type, .. } if event_type.is_empty()));
    }

    /// One minimal well-formed sample per discriminator. Keeps `KNOWN_TYPES`
    /// honest against the serde renames: every listed type must classify to a
    /// non-opaque variant whose `event_type()` round-trips.
    #[test]
    fn known_types_classify_non_opaque() {
        let item = json!({"type": "message", "role": "assistant", "content": []});
        for event_type in KNOWN_TYPES {
            let mut envelope = json!({"type": event_type});
            let body = envelope.as_object_mut().unwrap();
            match *event_type {
                "error" | "conversation.item.input_audio_transcription.failed" => {
                    let _ = body.insert("error".into(), json!({"message": "boom"}));
                }
                "session.created" | "session.updated" => {
                    let _ = body.insert("session".into(), json!({"id": "sess_1"}));
                }
                "conversation.item.added"
                | "conversation.item.done"
                | "response.output_item.added"
                | "response.output_item.done" => {
                    let _ = body.insert("item".into(), item.clone());
                }
                "response.created" | "response.done" => {
                    let _ = body.insert("response".into(), json!({"id": "resp_1"}));
                }
                t if t.ends_with(".delta") => {
                    let _ = body.insert("delta".into(), json!("x"));
                }
                "conversation.item.input_audio_transcription.completed"
                | "response.output_audio_transcript.done" => {
                    let _ = body.insert("transcript".into(), json!("x"));
                }
                "response.output_text.done" => {
                    let _ = body.insert("text".into(), json!("x"));
                }
                _ => {}
            }
            let event = classify(&envelope.to_string());
            assert!(
                !matches!(event, ServerEvent::Opaque { .. }),
                "{event_type} classified as opaque"
            );
            assert_eq!(event.event_type(), *event_type);
        }
    }

    #[test]
    fn session_created_carries_remote_session() {
        let event = classify(
            &json!({
                "type": "session.created",
                "event_id": "evt_1",
                "session": {"id": "sess_1", "voice": "marin", "turn_detection": null},
            })
            .to_string(),
        );
        let ServerEvent::SessionCreated { event_id, session } = event else {
            panic!("wrong variant");
        };
        assert_eq!(event_id.as_deref(), Some("evt_1"));
        assert_eq!(session.id.as_deref(), Some("sess_1"));
        assert_eq!(
            session.turn_detection,
            Some(crate::config::TurnDetection::Disabled)
        );
    }
}
