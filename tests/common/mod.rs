//! Shared test doubles for turn and session tests

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use aria_client::config::AudioSettings;
use aria_client::{
    AssistRequest, AssistResponse, AssistTransport, AudioFrame, Config, ConversationState,
    DeviceIdentity, DuplexAudio, Error, Result, TriggerSource, TurnChannel, TurnDriver,
    TurnOutcome,
};

/// Config pointing nowhere; transports are mocked
#[must_use]
pub fn test_config() -> Config {
    Config {
        endpoint: "ws://mock.invalid/assist".to_string(),
        language_code: "en-US".to_string(),
        device: DeviceIdentity {
            id: "dev-1".to_string(),
            model_id: "model-1".to_string(),
        },
        audio: AudioSettings::default(),
        deadline_secs: 5,
        volume_percentage: 50,
        data_dir: PathBuf::from("/tmp"),
    }
}

/// Script for one `open_turn` attempt
pub enum TurnScript {
    /// The attempt fails before a channel exists
    FailOpen(Error),
    /// The attempt succeeds; these messages arrive once the request
    /// sequence is exhausted
    Respond(Vec<Result<AssistResponse>>),
}

/// Transport double replaying one script per attempt and recording every
/// request sent
pub struct MockTransport {
    scripts: Mutex<VecDeque<TurnScript>>,
    sent: Arc<Mutex<Vec<Vec<AssistRequest>>>>,
    opens: Arc<AtomicU32>,
}

impl MockTransport {
    #[must_use]
    pub fn new(scripts: Vec<TurnScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            sent: Arc::new(Mutex::new(Vec::new())),
            opens: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Requests recorded per successfully opened attempt; the handle stays
    /// valid after the transport moves into an executor
    #[must_use]
    pub fn sent_turns(&self) -> Arc<Mutex<Vec<Vec<AssistRequest>>>> {
        Arc::clone(&self.sent)
    }

    /// Counter of `open_turn` calls, usable after the transport moves
    #[must_use]
    pub fn opens_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.opens)
    }
}

#[async_trait]
impl AssistTransport for MockTransport {
    async fn open_turn(&self, _deadline: Duration) -> Result<TurnChannel> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no script for this attempt");

        match script {
            TurnScript::FailOpen(e) => Err(e),
            TurnScript::Respond(responses) => {
                let (request_tx, mut request_rx) = mpsc::channel(32);
                let (response_tx, response_rx) = mpsc::channel(32);
                let sent = Arc::clone(&self.sent);

                // Collect the whole request sequence first, then respond;
                // keeps request recording race-free for assertions.
                tokio::spawn(async move {
                    let mut turn = Vec::new();
                    while let Some(request) = request_rx.recv().await {
                        turn.push(request);
                    }
                    sent.lock().unwrap().push(turn);
                    for item in responses {
                        if response_tx.send(item).await.is_err() {
                            break;
                        }
                    }
                });

                Ok(TurnChannel {
                    requests: request_tx,
                    responses: response_rx,
                })
            }
        }
    }
}

/// In-memory duplex with scripted capture chunks and recorded playback
#[derive(Default)]
pub struct MockDuplex {
    chunks: Mutex<VecDeque<AudioFrame>>,
    written: Mutex<Vec<AudioFrame>>,
    volume: AtomicU8,
    recording: AtomicBool,
    playing: AtomicBool,
    playback_started: AtomicBool,
    closed: AtomicBool,
    stop_recording_calls: AtomicU32,
    fail_playback: AtomicBool,
    capture_error: Mutex<Option<Error>>,
}

impl MockDuplex {
    #[must_use]
    pub fn new(chunks: Vec<AudioFrame>, volume: u8) -> Self {
        Self {
            chunks: Mutex::new(chunks.into_iter().collect()),
            volume: AtomicU8::new(volume),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn written(&self) -> Vec<AudioFrame> {
        self.written.lock().unwrap().clone()
    }

    #[must_use]
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn playback_started(&self) -> bool {
        self.playback_started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stop_recording_calls(&self) -> u32 {
        self.stop_recording_calls.load(Ordering::SeqCst)
    }

    /// Make `start_playback` fail
    pub fn fail_playback(&self) {
        self.fail_playback.store(true, Ordering::SeqCst);
    }

    /// Fail the next `read_chunk` once the scripted chunks are drained
    pub fn fail_capture_with(&self, error: Error) {
        *self.capture_error.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl DuplexAudio for MockDuplex {
    fn start_recording(&self) -> Result<()> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
        self.stop_recording_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn start_playback(&self) -> Result<()> {
        if self.fail_playback.load(Ordering::SeqCst) {
            return Err(Error::Audio("speaker unavailable".to_string()));
        }
        self.playing.store(true, Ordering::SeqCst);
        self.playback_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_playback(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    async fn read_chunk(&self) -> Result<Option<AudioFrame>> {
        if let Some(chunk) = self.chunks.lock().unwrap().pop_front() {
            return Ok(Some(chunk));
        }
        if let Some(error) = self.capture_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(None)
    }

    fn write(&self, audio: &[u8]) -> Result<()> {
        self.written.lock().unwrap().push(audio.to_vec());
        Ok(())
    }

    fn set_volume(&self, percentage: u8) {
        self.volume.store(percentage, Ordering::SeqCst);
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> u32 {
        16000
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Driver double replaying scripted outcomes and recording the continuation
/// state handed to each turn
pub struct ScriptedDriver {
    outcomes: VecDeque<Result<TurnOutcome>>,
    states_seen: Arc<Mutex<Vec<ConversationState>>>,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new(outcomes: Vec<Result<TurnOutcome>>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            states_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn states_seen(&self) -> Arc<Mutex<Vec<ConversationState>>> {
        Arc::clone(&self.states_seen)
    }
}

#[async_trait]
impl TurnDriver for ScriptedDriver {
    async fn run_turn(&mut self, state: ConversationState) -> Result<TurnOutcome> {
        self.states_seen.lock().unwrap().push(state);
        self.outcomes
            .pop_front()
            .expect("no scripted outcome for this turn")
    }
}

/// Trigger granting a fixed number of activations, then failing
pub struct CountingTrigger {
    granted: u32,
    budget: u32,
}

impl CountingTrigger {
    #[must_use]
    pub fn new(budget: u32) -> Self {
        Self { granted: 0, budget }
    }

    #[must_use]
    pub fn granted(&self) -> u32 {
        self.granted
    }
}

#[async_trait]
impl TriggerSource for CountingTrigger {
    async fn wait_for_trigger(&mut self) -> Result<()> {
        if self.granted < self.budget {
            self.granted += 1;
            Ok(())
        } else {
            Err(Error::Config("trigger budget exhausted".to_string()))
        }
    }
}
