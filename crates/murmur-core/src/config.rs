//! Session configuration — the caller-owned snapshot and the server echo.
//!
//! The wire protocol echoes a `session` body back on `session.created` and
//! `session.updated`, but some caller-set fields never round-trip (tool
//! definitions come back as bare schemas, tool choice and tracing metadata
//! come back not at all). [`SessionConfig::reconcile`] merges a server echo
//! into the prior snapshot without losing those fields.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text output.
    Text,
    /// Audio output.
    Audio,
}

/// Raw audio encoding used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    /// 16-bit PCM, 24kHz, mono, little-endian.
    #[serde(rename = "pcm16")]
    Pcm16,
    /// G.711 µ-law.
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 A-law.
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

/// Input audio transcription options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// Transcription model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Input language hint (ISO-639-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Voice-activity-detection mode.
///
/// `Disabled` serializes as an explicit `null` — the wire protocol requires
/// `"turn_detection": null` to switch VAD off, not an absent field.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDetection {
    /// Manual turn taking: the caller commits the audio buffer itself.
    Disabled,
    /// Server-side VAD: the service detects end of speech and responds.
    ServerVad {
        /// Activation threshold (0.0–1.0).
        threshold: Option<f64>,
        /// Audio included before detected speech, in milliseconds.
        prefix_padding_ms: Option<u32>,
        /// Silence required to close a turn, in milliseconds.
        silence_duration_ms: Option<u32>,
        /// Whether the server auto-creates a response at end of turn.
        create_response: Option<bool>,
    },
    /// A detection mode this crate does not model; preserved verbatim.
    Other(Value),
}

impl Serialize for TurnDetection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_none(),
            Self::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
                create_response,
            } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "server_vad")?;
                if let Some(v) = threshold {
                    map.serialize_entry("threshold", v)?;
                }
                if let Some(v) = prefix_padding_ms {
                    map.serialize_entry("prefix_padding_ms", v)?;
                }
                if let Some(v) = silence_duration_ms {
                    map.serialize_entry("silence_duration_ms", v)?;
                }
                if let Some(v) = create_response {
                    map.serialize_entry("create_response", v)?;
                }
                map.end()
            }
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TurnDetection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Vad {
            threshold: Option<f64>,
            prefix_padding_ms: Option<u32>,
            silence_duration_ms: Option<u32>,
            create_response: Option<bool>,
        }

        let value = Option::<Value>::deserialize(deserializer)?;
        let Some(value) = value else {
            return Ok(Self::Disabled);
        };
        if value.is_null() {
            return Ok(Self::Disabled);
        }
        if value.get("type").and_then(Value::as_str) == Some("server_vad") {
            if let Ok(vad) = serde_json::from_value::<Vad>(value.clone()) {
                return Ok(Self::ServerVad {
                    threshold: vad.threshold,
                    prefix_padding_ms: vad.prefix_padding_ms,
                    silence_duration_ms: vad.silence_duration_ms,
                    create_response: vad.create_response,
                });
            }
        }
        Ok(Self::Other(value))
    }
}

/// Field-level deserializer distinguishing an explicit `"turn_detection":
/// null` (VAD off) from an absent field (not set). Plain `Option<T>` would
/// collapse both to `None`.
fn turn_detection_field<'de, D>(deserializer: D) -> Result<Option<TurnDetection>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    TurnDetection::deserialize(deserializer).map(Some)
}

/// Callable tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool kind; the wire currently only knows `"function"`.
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    /// Tool name.
    pub name: String,
    /// Human-readable description shown to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema of the tool parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

fn function_kind() -> String {
    "function".to_owned()
}

impl ToolDefinition {
    /// Build a function tool from name, description and parameter schema.
    #[must_use]
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: function_kind(),
            name: name.to_owned(),
            description: Some(description.to_owned()),
            parameters: Some(parameters),
        }
    }
}

/// Tool-selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// One of the preset policies (`auto`, `none`, `required`).
    Preset(ToolChoicePreset),
    /// Force a specific function.
    Function {
        /// Always `"function"`.
        #[serde(rename = "type")]
        kind: String,
        /// Name of the function to call.
        name: String,
    },
}

/// Preset tool-selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoicePreset {
    /// Model decides whether to call tools.
    Auto,
    /// Tools disabled.
    None,
    /// Model must call a tool.
    Required,
}

/// Caller-owned configuration snapshot for a live session.
///
/// Replaced wholesale on every update so readers never observe a partially
/// applied configuration. Serializes to the `session` body of a
/// `session.update` wire event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Requested response modalities.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modalities: Vec<Modality>,
    /// System instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Output voice identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Encoding of caller-appended input audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioFormat>,
    /// Encoding of model output audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioFormat>,
    /// Input transcription options; `None` disables transcription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionOptions>,
    /// Voice-activity-detection mode. `None` means "not set" and is omitted
    /// from the wire; `Some(TurnDetection::Disabled)` sends an explicit null.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "turn_detection_field",
        default
    )]
    pub turn_detection: Option<TurnDetection>,
    /// Callable tools. Never echoed back as callables by the server.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<ToolDefinition>,
    /// Tool-selection policy. Not echoed back by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Cap on output tokens per response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<u32>,
    /// Tracing metadata forwarded to the service. Not echoed back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<Value>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            modalities: vec![Modality::Text, Modality::Audio],
            instructions: None,
            voice: None,
            input_audio_format: None,
            output_audio_format: None,
            input_audio_transcription: None,
            turn_detection: None,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
            max_response_output_tokens: None,
            tracing: None,
        }
    }
}

impl SessionConfig {
    /// Merge a server-echoed session body into this snapshot.
    ///
    /// Server-returned fields win where present; fields the wire never
    /// round-trips (tools, tool choice, tracing metadata) are carried forward
    /// from `self`.
    #[must_use]
    pub fn reconcile(&self, remote: &RemoteSession) -> Self {
        Self {
            modalities: remote
                .modalities
                .clone()
                .unwrap_or_else(|| self.modalities.clone()),
            instructions: remote
                .instructions
                .clone()
                .or_else(|| self.instructions.clone()),
            voice: remote.voice.clone().or_else(|| self.voice.clone()),
            input_audio_format: remote.input_audio_format.or(self.input_audio_format),
            output_audio_format: remote.output_audio_format.or(self.output_audio_format),
            input_audio_transcription: remote
                .input_audio_transcription
                .clone()
                .or_else(|| self.input_audio_transcription.clone()),
            turn_detection: remote
                .turn_detection
                .clone()
                .or_else(|| self.turn_detection.clone()),
            // Echoed only as schemas — keep the caller's definitions.
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
            temperature: remote.temperature.or(self.temperature),
            max_response_output_tokens: remote
                .max_response_output_tokens
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .or(self.max_response_output_tokens),
            tracing: self.tracing.clone(),
        }
    }
}

/// Session body as echoed by the server on `session.created` / `session.updated`.
///
/// Deliberately looser than [`SessionConfig`]: all fields optional, tools as
/// raw schemas, token cap may be the string `"inf"`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteSession {
    /// Server-assigned session id.
    pub id: Option<String>,
    /// Model actually serving the session.
    pub model: Option<String>,
    /// Echoed modalities.
    pub modalities: Option<Vec<Modality>>,
    /// Echoed instructions.
    pub instructions: Option<String>,
    /// Echoed voice.
    pub voice: Option<String>,
    /// Echoed input format.
    pub input_audio_format: Option<AudioFormat>,
    /// Echoed output format.
    pub output_audio_format: Option<AudioFormat>,
    /// Echoed transcription options.
    pub input_audio_transcription: Option<TranscriptionOptions>,
    /// Echoed VAD mode; `Some(Disabled)` when the echo carries a null.
    #[serde(deserialize_with = "turn_detection_field", default)]
    pub turn_detection: Option<TurnDetection>,
    /// Tool schemas (not callables).
    pub tools: Option<Vec<Value>>,
    /// Echoed temperature.
    pub temperature: Option<f64>,
    /// Echoed token cap; number or `"inf"`.
    pub max_response_output_tokens: Option<Value>,
    /// Fields this crate does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
