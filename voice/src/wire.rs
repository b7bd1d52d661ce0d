//! JSON frames exchanged with the bidirectional live endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use newhealth_core::{Blob, Content, Tool};

/// Frames the client writes to the socket. The external tag becomes the top
/// level key of the JSON object ({"setup": ...}, {"realtimeInput": ...}).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SessionSetup),
    #[serde(rename_all = "camelCase")]
    RealtimeInput { media: Blob },
    #[serde(rename_all = "camelCase")]
    ToolResponse {
        function_responses: Vec<LiveFunctionResponse>,
    },
}

/// First frame of every session, fixing model, voice and tool surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    pub model: String,
    pub generation_config: LiveGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// Presence requests transcription of the model's speech.
    pub output_audio_transcription: Empty,
    /// Presence requests transcription of the caller's speech.
    pub input_audio_transcription: Empty,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Empty {}

/// Answer to a [`LiveFunctionCall`], correlated by the server-issued id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveFunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// Frames the server writes back. Exactly one of the optional sections is
/// populated per frame in practice, but nothing enforces that, so all are
/// modeled as optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Empty>,
    #[serde(default)]
    pub tool_call: Option<ToolCallMessage>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<LiveFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveFunctionCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}
