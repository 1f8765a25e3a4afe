//! Aria - Streaming voice-assistant client
//!
//! This library implements the client side of a bidirectional-streaming
//! conversation protocol:
//! - Audio duplexing (microphone capture, synthesized-speech playback)
//! - Turn execution over a streaming transport
//! - Transient-fault retry and the conversation session loop
//! - Device-action dispatch for commands embedded in responses
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Session loop                      │
//! │   trigger wait  │  turn sequencing  │  state carry  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │           Turn executor (+ retry wrapper)            │
//! │   request pump  │  response effects  │  dispatch    │
//! └──────┬───────────────────┬──────────────────┬───────┘
//!        │                   │                  │
//! ┌──────▼──────┐   ┌────────▼────────┐  ┌──────▼───────┐
//! │ DuplexAudio │   │ AssistTransport │  │  Dispatcher  │
//! │ mic/speaker │   │  WebSocket      │  │ device cmds  │
//! └─────────────┘   └─────────────────┘  └──────────────┘
//! ```

pub mod assist;
pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

pub use assist::{
    MAX_TURN_ATTEMPTS, Query, RetryingDriver, Session, SessionOptions, SessionState,
    TriggerSource, TurnDriver, TurnExecutor, TurnOutcome, with_retry,
};
pub use audio::{AudioFrame, DeviceDuplex, DuplexAudio, FileDuplex};
pub use config::{Config, DeviceIdentity, Overrides};
pub use device::{DeviceActionRequest, DeviceDispatcher, PendingCompletion};
pub use error::{Error, Result};
pub use protocol::{AssistRequest, AssistResponse, ConversationState, MicrophoneMode};
pub use transport::{AssistTransport, TurnChannel, WsTransport};
