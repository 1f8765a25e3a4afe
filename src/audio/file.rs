//! WAV-file backed duplex for bounded, hardware-free turns
//!
//! The source side plays a prerecorded query from a WAV file; the sink side
//! collects the assistant's reply and finalizes it as a WAV on `close`.
//! Either side may be absent: a missing source yields no captured chunks and
//! a missing sink discards playback.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use async_trait::async_trait;

use super::{AudioFrame, DuplexAudio};
use crate::config::AudioSettings;
use crate::{Error, Result};

/// Duplex over WAV files instead of live audio hardware
pub struct FileDuplex {
    sample_rate: u32,
    chunk_bytes: usize,
    source: Mutex<VecDeque<u8>>,
    recording: AtomicBool,
    written: Mutex<Vec<u8>>,
    output_path: Option<PathBuf>,
    volume: AtomicU8,
}

impl FileDuplex {
    /// Create a file duplex from optional input and output WAV paths.
    ///
    /// # Errors
    ///
    /// Returns error if the input WAV cannot be read or its sample rate does
    /// not match the configured one
    pub fn new(
        input: Option<&Path>,
        output: Option<PathBuf>,
        settings: &AudioSettings,
        initial_volume: u8,
    ) -> Result<Self> {
        let mut source = VecDeque::new();
        if let Some(path) = input {
            let mut reader =
                hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
            let spec = reader.spec();
            if spec.sample_rate != settings.sample_rate {
                return Err(Error::Audio(format!(
                    "input file sample rate {} does not match configured {}",
                    spec.sample_rate, settings.sample_rate
                )));
            }
            for sample in reader.samples::<i16>() {
                let sample = sample.map_err(|e| Error::Audio(e.to_string()))?;
                source.extend(sample.to_le_bytes());
            }
            tracing::debug!(path = %path.display(), bytes = source.len(), "loaded input audio file");
        }

        Ok(Self {
            sample_rate: settings.sample_rate,
            chunk_bytes: settings.chunk_bytes,
            source: Mutex::new(source),
            recording: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
            output_path: output,
            volume: AtomicU8::new(initial_volume),
        })
    }
}

#[async_trait]
impl DuplexAudio for FileDuplex {
    fn start_recording(&self) -> Result<()> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    fn start_playback(&self) -> Result<()> {
        Ok(())
    }

    fn stop_playback(&self) {}

    async fn read_chunk(&self) -> Result<Option<AudioFrame>> {
        if !self.recording.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut source = self
            .source
            .lock()
            .map_err(|_| Error::Audio("source buffer poisoned".to_string()))?;
        if source.is_empty() {
            // File exhausted: the query has been fully sent
            self.recording.store(false, Ordering::SeqCst);
            return Ok(None);
        }
        let take = self.chunk_bytes.min(source.len());
        Ok(Some(source.drain(..take).collect()))
    }

    fn write(&self, audio: &[u8]) -> Result<()> {
        let mut written = self
            .written
            .lock()
            .map_err(|_| Error::Audio("sink buffer poisoned".to_string()))?;
        written.extend_from_slice(audio);
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

        let Some(path) = self.output_path.as_ref() else {
            return;
        };
        let Ok(mut written) = self.written.lock() else {
            return;
        };
        if written.is_empty() {
            return;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let result = hound::WavWriter::create(path, spec).and_then(|mut writer| {
            for pair in written.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            }
            writer.finalize()
        });
        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), bytes = written.len(), "wrote output audio file");
                written.clear();
            }
            Err(e) => tracing::error!(error = %e, "failed to write output audio file"),
        }
    }
}
