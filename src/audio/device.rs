//! Live microphone/speaker duplex
//!
//! cpal streams are not `Send`, so a dedicated audio thread owns them and
//! the duplex handle talks to it over a command channel. Captured and
//! playback bytes move through shared ring buffers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::{AudioFrame, DuplexAudio};
use crate::config::AudioSettings;
use crate::{Error, Result};

/// How long control calls wait for the audio thread to acknowledge
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for captured bytes
const READ_POLL: Duration = Duration::from_millis(10);

enum Command {
    StartRecording(mpsc::Sender<Result<()>>),
    StopRecording,
    StartPlayback(mpsc::Sender<Result<()>>),
    StopPlayback,
    Close,
}

/// Duplex over the default system microphone and speaker
pub struct DeviceDuplex {
    sample_rate: u32,
    chunk_bytes: usize,
    captured: Arc<Mutex<VecDeque<u8>>>,
    pending: Arc<Mutex<VecDeque<u8>>>,
    recording: Arc<AtomicBool>,
    volume: Arc<AtomicU8>,
    commands: mpsc::Sender<Command>,
}

impl DeviceDuplex {
    /// Create a duplex over the default input and output devices.
    ///
    /// Device handles are acquired lazily when a phase starts, so creation
    /// succeeds even before audio hardware is touched.
    #[must_use]
    pub fn new(settings: &AudioSettings, initial_volume: u8) -> Self {
        let captured = Arc::new(Mutex::new(VecDeque::new()));
        let pending = Arc::new(Mutex::new(VecDeque::new()));
        let recording = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(AtomicU8::new(initial_volume));

        let (commands, command_rx) = mpsc::channel();

        let thread_state = AudioThread {
            sample_rate: settings.sample_rate,
            captured: Arc::clone(&captured),
            pending: Arc::clone(&pending),
            recording: Arc::clone(&recording),
            volume: Arc::clone(&volume),
        };
        std::thread::Builder::new()
            .name("aria-audio".to_string())
            .spawn(move || thread_state.run(&command_rx))
            .ok();

        Self {
            sample_rate: settings.sample_rate,
            chunk_bytes: settings.chunk_bytes,
            captured,
            pending,
            recording,
            volume,
            commands,
        }
    }

    fn roundtrip(
        &self,
        make: impl FnOnce(mpsc::Sender<Result<()>>) -> Command,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| Error::Audio("audio thread gone".to_string()))?;
        reply_rx
            .recv_timeout(COMMAND_TIMEOUT)
            .map_err(|_| Error::Audio("audio thread unresponsive".to_string()))?
    }
}

#[async_trait]
impl DuplexAudio for DeviceDuplex {
    fn start_recording(&self) -> Result<()> {
        self.recording.store(true, Ordering::SeqCst);
        self.roundtrip(Command::StartRecording)
    }

    fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
        let _ = self.commands.send(Command::StopRecording);
    }

    fn start_playback(&self) -> Result<()> {
        self.roundtrip(Command::StartPlayback)
    }

    fn stop_playback(&self) {
        let _ = self.commands.send(Command::StopPlayback);
    }

    async fn read_chunk(&self) -> Result<Option<AudioFrame>> {
        loop {
            {
                let mut captured = self
                    .captured
                    .lock()
                    .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;
                if captured.len() >= self.chunk_bytes {
                    return Ok(Some(captured.drain(..self.chunk_bytes).collect()));
                }
                if !self.recording.load(Ordering::SeqCst) {
                    if captured.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(captured.drain(..).collect()));
                }
            }
            tokio::time::sleep(READ_POLL).await;
        }
    }

    fn write(&self, audio: &[u8]) -> Result<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Error::Audio("playback buffer poisoned".to_string()))?;
        pending.extend(audio.iter().copied());
        Ok(())
    }

    fn set_volume(&self, percentage: u8) {
        self.volume.store(percentage, Ordering::SeqCst);
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&self) {
        self.recording.store(false, Ordering::SeqCst);
        let _ = self.commands.send(Command::Close);
        if let Ok(mut captured) = self.captured.lock() {
            captured.clear();
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

/// State owned by the dedicated audio thread
struct AudioThread {
    sample_rate: u32,
    captured: Arc<Mutex<VecDeque<u8>>>,
    pending: Arc<Mutex<VecDeque<u8>>>,
    recording: Arc<AtomicBool>,
    volume: Arc<AtomicU8>,
}

impl AudioThread {
    fn run(self, commands: &mpsc::Receiver<Command>) {
        let mut input: Option<Stream> = None;
        let mut output: Option<Stream> = None;

        while let Ok(command) = commands.recv() {
            match command {
                Command::StartRecording(reply) => {
                    let result = if input.is_some() {
                        Ok(())
                    } else {
                        self.build_input().map(|stream| {
                            input = Some(stream);
                        })
                    };
                    let _ = reply.send(result);
                }
                Command::StopRecording => {
                    input = None;
                }
                Command::StartPlayback(reply) => {
                    let result = if output.is_some() {
                        Ok(())
                    } else {
                        self.build_output().map(|stream| {
                            output = Some(stream);
                        })
                    };
                    let _ = reply.send(result);
                }
                Command::StopPlayback => {
                    output = None;
                }
                Command::Close => {
                    input = None;
                    output = None;
                    tracing::debug!("audio device handles released");
                }
            }
        }
    }

    fn build_input(&self) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let config = input_config(&device, self.sample_rate)?;
        let captured = Arc::clone(&self.captured);
        let recording = Arc::clone(&self.recording);
        let channels = usize::from(config.channels);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !recording.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Ok(mut buf) = captured.lock() {
                        // Downmix to mono and quantize to LINEAR16
                        for frame in data.chunks(channels) {
                            #[allow(clippy::cast_precision_loss)]
                            let sample = frame.iter().sum::<f32>() / frame.len() as f32;
                            #[allow(clippy::cast_possible_truncation)]
                            let quantized =
                                (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                            buf.extend(quantized.to_le_bytes());
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::debug!(sample_rate = self.sample_rate, "audio capture started");
        Ok(stream)
    }

    fn build_output(&self) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let config = output_config(&device, self.sample_rate)?;
        let pending = Arc::clone(&self.pending);
        let volume = Arc::clone(&self.volume);
        let channels = usize::from(config.channels);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let gain = f32::from(volume.load(Ordering::SeqCst)) / 100.0;
                    let mut buf = match pending.lock() {
                        Ok(buf) => buf,
                        Err(_) => return,
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = if buf.len() >= 2 {
                            let lo = buf.pop_front().unwrap_or(0);
                            let hi = buf.pop_front().unwrap_or(0);
                            f32::from(i16::from_le_bytes([lo, hi])) / 32768.0 * gain
                        } else {
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::debug!(sample_rate = self.sample_rate, "audio playback started");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Creation and volume control never touch audio hardware
    #[test]
    fn volume_updates_are_visible_to_the_playback_gain() {
        let duplex = DeviceDuplex::new(&AudioSettings::default(), 50);
        assert_eq!(duplex.volume(), 50);

        duplex.set_volume(40);
        assert_eq!(duplex.volume(), 40);
        assert_eq!(duplex.volume.load(Ordering::SeqCst), 40);
    }
}

fn input_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

    Ok(supported.with_sample_rate(SampleRate(sample_rate)).config())
}

fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported.with_sample_rate(SampleRate(sample_rate)).config())
}
