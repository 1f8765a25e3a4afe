//! Turn executor: one request/response cycle over the streaming channel
//!
//! A turn starts recording, streams the config-then-audio request sequence
//! while concurrently consuming responses, and reports whether the
//! conversation should continue. Response handling is split into a pure
//! [`classify`] step producing [`ResponseEffect`]s and an apply step, so each
//! message's handling is testable without a live channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::audio::DuplexAudio;
use crate::config::Config;
use crate::device::{DeviceActionRequest, DeviceDispatcher, PendingCompletion};
use crate::protocol::{
    AssistConfig, AssistRequest, AssistResponse, AudioInConfig, AudioOutConfig,
    ConversationState, DeviceConfig, DialogStateIn, ENCODING_LINEAR16, MicrophoneMode,
    log_response_without_audio,
};
use crate::transport::{AssistTransport, TurnChannel};
use crate::{Error, Result};

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Whether the service expects an immediate follow-on utterance
    pub continue_conversation: bool,
    /// Continuation token to echo on the next turn
    pub conversation_state: ConversationState,
}

/// What drives a turn: live captured audio or a literal text query
#[derive(Debug, Clone)]
pub enum Query {
    /// Capture audio from the duplex stream
    Audio,
    /// Send a text query instead of audio input
    Text(String),
}

/// One effect a response message asks the client to apply.
///
/// A single message may produce several; each field of the response is
/// classified independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResponseEffect {
    /// The utterance has been fully heard; stop the capture phase
    StopRecording,
    /// Transcript of the recognized user speech
    Transcript(String),
    /// Synthesized audio bytes to write to the sink
    PlayAudio(Vec<u8>),
    /// Replace the stored continuation token
    StoreState(ConversationState),
    /// Update the playback volume
    SetVolume(u8),
    /// Set the turn's continue flag
    SetContinue(bool),
    /// Parse and dispatch a device-action payload
    DispatchAction(String),
    /// Supplemental display text
    DisplayText(String),
}

/// Classify one response message into its effects.
///
/// Pure: no I/O, no state. Empty/zero/unspecified fields produce no effect
/// (a zero volume means "unset", an empty continuation blob means "no
/// update").
pub(crate) fn classify(response: &AssistResponse) -> Vec<ResponseEffect> {
    let mut effects = Vec::new();
    if response.end_of_utterance {
        effects.push(ResponseEffect::StopRecording);
    }
    if let Some(transcript) = &response.transcript {
        effects.push(ResponseEffect::Transcript(transcript.clone()));
    }
    if !response.audio.is_empty() {
        effects.push(ResponseEffect::PlayAudio(response.audio.clone()));
    }
    if !response.conversation_state.is_empty() {
        effects.push(ResponseEffect::StoreState(response.conversation_state.clone()));
    }
    if response.volume_percentage != 0 {
        effects.push(ResponseEffect::SetVolume(response.volume_percentage));
    }
    match response.microphone_mode {
        MicrophoneMode::FollowOn => effects.push(ResponseEffect::SetContinue(true)),
        MicrophoneMode::CloseMicrophone => effects.push(ResponseEffect::SetContinue(false)),
        MicrophoneMode::Unspecified => {}
    }
    if let Some(payload) = &response.device_action {
        effects.push(ResponseEffect::DispatchAction(payload.clone()));
    }
    if let Some(text) = &response.display_text {
        effects.push(ResponseEffect::DisplayText(text.clone()));
    }
    effects
}

/// Mutable state accumulated while consuming one turn's responses
struct TurnContext {
    continue_conversation: bool,
    conversation_state: ConversationState,
    completions: Vec<PendingCompletion>,
}

/// Executes single turns against the assistant service
pub struct TurnExecutor<T: AssistTransport> {
    transport: T,
    duplex: Arc<dyn DuplexAudio>,
    dispatcher: Arc<DeviceDispatcher>,
    config: Config,
}

impl<T: AssistTransport> TurnExecutor<T> {
    /// Create an executor over the given collaborators
    pub fn new(
        transport: T,
        duplex: Arc<dyn DuplexAudio>,
        dispatcher: Arc<DeviceDispatcher>,
        config: Config,
    ) -> Self {
        Self {
            transport,
            duplex,
            dispatcher,
            config,
        }
    }

    /// Run exactly one request/response cycle.
    ///
    /// The continuation state is consumed by value and the updated value
    /// returned in the outcome; on error the turn's partial state is
    /// discarded by the caller.
    ///
    /// # Errors
    ///
    /// Propagates transport failures (for the retry wrapper to classify),
    /// malformed device-action payloads, and failed device-action
    /// completions
    pub async fn run_turn(
        &self,
        state: ConversationState,
        query: Query,
    ) -> Result<TurnOutcome> {
        let audio_mode = matches!(query, Query::Audio);

        if audio_mode {
            self.duplex.start_recording()?;
            tracing::info!("recording audio request");
        }

        let deadline = Duration::from_secs(self.config.deadline_secs);
        let TurnChannel {
            requests,
            mut responses,
        } = match self.transport.open_turn(deadline).await {
            Ok(channel) => channel,
            Err(e) => {
                self.duplex.stop_recording();
                return Err(e);
            }
        };

        let send_task = self.spawn_send_pump(requests, self.build_config(&state, &query), audio_mode);

        let mut ctx = TurnContext {
            continue_conversation: false,
            conversation_state: state,
            completions: Vec::new(),
        };

        let mut turn_error: Option<Error> = None;
        while let Some(item) = responses.recv().await {
            match item {
                Ok(response) => {
                    log_response_without_audio(&response);
                    if let Err(e) = self.apply_response(&response, &mut ctx) {
                        turn_error = Some(e);
                        break;
                    }
                }
                Err(e) => {
                    turn_error = Some(e);
                    break;
                }
            }
        }

        // The capture phase ends with the response stream either way; if the
        // service never signaled end-of-utterance this unblocks the send pump.
        self.duplex.stop_recording();

        if let Some(e) = turn_error {
            send_task.abort();
            self.duplex.stop_playback();
            return Err(e);
        }

        match send_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.duplex.stop_playback();
                return Err(e);
            }
            Err(e) => {
                self.duplex.stop_playback();
                return Err(Error::Transport(format!("request pump panicked: {e}")));
            }
        }

        let mut completion_error = None;
        if !ctx.completions.is_empty() {
            tracing::info!(
                count = ctx.completions.len(),
                "waiting for device executions to complete"
            );
            for completion in ctx.completions {
                if let Err(e) = completion.wait().await {
                    tracing::error!(error = %e, "device action failed");
                    completion_error.get_or_insert(e);
                }
            }
        }

        tracing::info!("finished playing assistant response");
        self.duplex.stop_playback();

        if let Some(e) = completion_error {
            return Err(e);
        }

        if !ctx.continue_conversation {
            self.duplex.close();
        }

        Ok(TurnOutcome {
            continue_conversation: ctx.continue_conversation,
            conversation_state: ctx.conversation_state,
        })
    }

    /// Build the turn's first message: configuration, no audio payload
    fn build_config(&self, state: &ConversationState, query: &Query) -> AssistRequest {
        let audio_in = match query {
            Query::Audio => Some(AudioInConfig {
                encoding: ENCODING_LINEAR16.to_string(),
                sample_rate_hertz: self.duplex.sample_rate(),
            }),
            Query::Text(_) => None,
        };
        let text_query = match query {
            Query::Audio => None,
            Query::Text(text) => Some(text.clone()),
        };

        AssistRequest::Config(AssistConfig {
            audio_in,
            audio_out: AudioOutConfig {
                encoding: ENCODING_LINEAR16.to_string(),
                sample_rate_hertz: self.duplex.sample_rate(),
                volume_percentage: self.duplex.volume(),
            },
            dialog_state_in: DialogStateIn {
                language_code: self.config.language_code.clone(),
                conversation_state: state.clone(),
            },
            device: DeviceConfig {
                device_id: self.config.device.id.clone(),
                device_model_id: self.config.device.model_id.clone(),
            },
            text_query,
        })
    }

    /// Stream the outgoing sequence: config first, then captured audio.
    ///
    /// Playback readiness is signaled only once the sequence is exhausted;
    /// the sink must not open before the request side has logically
    /// finished. Capture and playback-start failures come back through the
    /// handle and fail the turn.
    fn spawn_send_pump(
        &self,
        requests: tokio::sync::mpsc::Sender<AssistRequest>,
        config_request: AssistRequest,
        audio_mode: bool,
    ) -> JoinHandle<Result<()>> {
        let duplex = Arc::clone(&self.duplex);
        tokio::spawn(async move {
            if requests.send(config_request).await.is_err() {
                // Receiver gone: the transport failure surfaces on the
                // response side
                return Ok(());
            }
            if audio_mode {
                loop {
                    match duplex.read_chunk().await {
                        Ok(Some(chunk)) => {
                            if requests
                                .send(AssistRequest::Audio { data: chunk })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
            drop(requests);
            duplex.start_playback()
        })
    }

    /// Apply every effect of one response message
    fn apply_response(&self, response: &AssistResponse, ctx: &mut TurnContext) -> Result<()> {
        for effect in classify(response) {
            self.apply_effect(effect, ctx)?;
        }
        Ok(())
    }

    fn apply_effect(&self, effect: ResponseEffect, ctx: &mut TurnContext) -> Result<()> {
        match effect {
            ResponseEffect::StopRecording => {
                tracing::info!("end of audio request detected");
                self.duplex.stop_recording();
            }
            ResponseEffect::Transcript(transcript) => {
                tracing::info!(%transcript, "transcript of user request");
            }
            ResponseEffect::PlayAudio(bytes) => {
                self.duplex.write(&bytes)?;
            }
            ResponseEffect::StoreState(state) => {
                tracing::debug!(len = state.len(), "updating conversation state");
                ctx.conversation_state = state;
            }
            ResponseEffect::SetVolume(percentage) => {
                tracing::info!(volume = percentage, "setting playback volume");
                self.duplex.set_volume(percentage);
            }
            ResponseEffect::SetContinue(continue_conversation) => {
                if continue_conversation {
                    tracing::info!("expecting follow-on query from user");
                } else {
                    tracing::info!("microphone will close after this turn");
                }
                ctx.continue_conversation = continue_conversation;
            }
            ResponseEffect::DispatchAction(payload) => {
                for request in DeviceActionRequest::parse_payload(&payload)? {
                    ctx.completions.extend(self.dispatcher.handle(request));
                }
            }
            ResponseEffect::DisplayText(text) => {
                tracing::info!(%text, "assistant display text");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> AssistResponse {
        AssistResponse::default()
    }

    #[test]
    fn empty_response_has_no_effects() {
        assert!(classify(&response()).is_empty());
    }

    #[test]
    fn end_of_utterance_stops_recording() {
        let mut resp = response();
        resp.end_of_utterance = true;
        assert_eq!(classify(&resp), vec![ResponseEffect::StopRecording]);
    }

    #[test]
    fn zero_volume_means_unset() {
        let mut resp = response();
        resp.volume_percentage = 0;
        assert!(classify(&resp).is_empty());

        resp.volume_percentage = 40;
        assert_eq!(classify(&resp), vec![ResponseEffect::SetVolume(40)]);
    }

    #[test]
    fn empty_state_blob_is_no_update() {
        let mut resp = response();
        resp.conversation_state = ConversationState::default();
        assert!(classify(&resp).is_empty());

        resp.conversation_state = ConversationState::new(vec![7, 8]);
        assert_eq!(
            classify(&resp),
            vec![ResponseEffect::StoreState(ConversationState::new(vec![7, 8]))]
        );
    }

    #[test]
    fn microphone_modes_map_to_continue_flag() {
        let mut resp = response();
        resp.microphone_mode = MicrophoneMode::FollowOn;
        assert_eq!(classify(&resp), vec![ResponseEffect::SetContinue(true)]);

        resp.microphone_mode = MicrophoneMode::CloseMicrophone;
        assert_eq!(classify(&resp), vec![ResponseEffect::SetContinue(false)]);
    }

    #[test]
    fn one_message_may_trigger_several_effects() {
        let mut resp = response();
        resp.end_of_utterance = true;
        resp.transcript = Some("turn on the light".to_string());
        resp.audio = vec![1, 2];
        resp.microphone_mode = MicrophoneMode::CloseMicrophone;

        let effects = classify(&resp);
        assert_eq!(effects.len(), 4);
        assert!(effects.contains(&ResponseEffect::StopRecording));
        assert!(effects.contains(&ResponseEffect::PlayAudio(vec![1, 2])));
        assert!(effects.contains(&ResponseEffect::SetContinue(false)));
    }
}
