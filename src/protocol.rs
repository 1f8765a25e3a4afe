//! Wire protocol for the assistant streaming channel
//!
//! Message shapes exchanged over one bidirectional turn. The first outgoing
//! message carries configuration only; every subsequent outgoing message
//! carries captured audio only. Incoming messages may populate any subset of
//! their fields, and each populated field is handled independently.

use serde::{Deserialize, Serialize};

/// Linear PCM encoding identifier used for both audio directions
pub const ENCODING_LINEAR16: &str = "LINEAR16";

/// Base64 (de)serialization for raw byte blobs carried in JSON frames
mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Opaque continuation token issued by the remote service.
///
/// Stored and echoed back verbatim on the next turn, never inspected or
/// mutated by the client. Empty on the first turn of a fresh session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState(#[serde(with = "b64")] Vec<u8>);

impl ConversationState {
    /// Wrap a raw continuation blob
    #[must_use]
    pub const fn new(blob: Vec<u8>) -> Self {
        Self(blob)
    }

    /// True for a fresh session with no continuation token
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Size of the blob in bytes (for logging only)
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Microphone directive carried in a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicrophoneMode {
    /// No directive in this message
    #[default]
    Unspecified,
    /// Service expects an immediate follow-up utterance without a new trigger
    FollowOn,
    /// Microphone should close after this turn
    CloseMicrophone,
}

/// Captured-audio input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInConfig {
    /// Audio encoding identifier
    pub encoding: String,
    /// Capture sample rate in hertz
    pub sample_rate_hertz: u32,
}

/// Synthesized-audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioOutConfig {
    /// Audio encoding identifier
    pub encoding: String,
    /// Playback sample rate in hertz
    pub sample_rate_hertz: u32,
    /// Initial playback volume (0-100)
    pub volume_percentage: u8,
}

/// Dialog continuation state sent with the config message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogStateIn {
    /// Language code for the conversation (e.g. "en-US")
    pub language_code: String,
    /// Continuation token from the previous turn, empty for a fresh session
    #[serde(default)]
    pub conversation_state: ConversationState,
}

/// Identity of the registered device instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Registered device instance identifier
    pub device_id: String,
    /// Device model identifier
    pub device_model_id: String,
}

/// Session configuration carried by the first message of every turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    /// Input audio parameters; absent for text-driven turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_in: Option<AudioInConfig>,

    /// Output audio parameters
    pub audio_out: AudioOutConfig,

    /// Dialog continuation state
    pub dialog_state_in: DialogStateIn,

    /// Device identity
    pub device: DeviceConfig,

    /// Literal text query for text-driven turns, instead of audio input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_query: Option<String>,
}

/// One outgoing message on the streaming channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistRequest {
    /// First message of a turn: configuration, no audio payload
    Config(AssistConfig),
    /// Subsequent messages: captured audio only
    Audio {
        /// Raw LINEAR16 PCM bytes
        #[serde(with = "b64")]
        data: Vec<u8>,
    },
}

/// One incoming message on the streaming channel.
///
/// Any subset of fields may be populated; absent fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistResponse {
    /// The service has fully heard the user's utterance
    #[serde(default)]
    pub end_of_utterance: bool,

    /// Transcript of the recognized user speech
    #[serde(default)]
    pub transcript: Option<String>,

    /// Synthesized speech bytes to play, in arrival order
    #[serde(default, with = "b64")]
    pub audio: Vec<u8>,

    /// Updated continuation token; empty means "no update"
    #[serde(default)]
    pub conversation_state: ConversationState,

    /// Target playback volume; zero means "unset", not "silent"
    #[serde(default)]
    pub volume_percentage: u8,

    /// Microphone directive for the next turn
    #[serde(default)]
    pub microphone_mode: MicrophoneMode,

    /// Serialized device-action payload, if the response requests one
    #[serde(default)]
    pub device_action: Option<String>,

    /// Human-readable supplemental display text
    #[serde(default)]
    pub display_text: Option<String>,
}

/// Log an outgoing request at debug level without its audio payload
pub fn log_request_without_audio(request: &AssistRequest) {
    match request {
        AssistRequest::Config(config) => {
            tracing::debug!(
                language = %config.dialog_state_in.language_code,
                device = %config.device.device_id,
                conversation_state_len = config.dialog_state_in.conversation_state.len(),
                text_query = ?config.text_query,
                "sending config request"
            );
        }
        AssistRequest::Audio { data } => {
            tracing::trace!(bytes = data.len(), "sending audio request");
        }
    }
}

/// Log an incoming response at debug level without its audio payload
pub fn log_response_without_audio(response: &AssistResponse) {
    tracing::debug!(
        end_of_utterance = response.end_of_utterance,
        transcript = ?response.transcript,
        audio_bytes = response.audio.len(),
        conversation_state_len = response.conversation_state.len(),
        volume = response.volume_percentage,
        microphone_mode = ?response.microphone_mode,
        has_device_action = response.device_action.is_some(),
        "received response"
    );
}
