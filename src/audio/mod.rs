//! Audio duplex stream abstractions
//!
//! A [`DuplexAudio`] carries both directions of a conversation: captured
//! microphone chunks flowing out to the service, and synthesized speech
//! flowing back in. Methods take `&self` so the turn executor's send and
//! receive paths can share one `Arc<dyn DuplexAudio>`; implementations use
//! interior mutability.

mod device;
mod file;

pub use device::DeviceDuplex;
pub use file::FileDuplex;

use async_trait::async_trait;

use crate::Result;

/// A chunk of linear PCM audio bytes
pub type AudioFrame = Vec<u8>;

/// Bidirectional audio source/sink with controllable phases and volume
#[async_trait]
pub trait DuplexAudio: Send + Sync {
    /// Begin the capture phase
    ///
    /// # Errors
    ///
    /// Returns error if the capture device cannot be started
    fn start_recording(&self) -> Result<()>;

    /// End the capture phase; buffered chunks remain readable until drained
    fn stop_recording(&self);

    /// Make the sink eligible to receive audio
    ///
    /// # Errors
    ///
    /// Returns error if the playback device cannot be started
    fn start_playback(&self) -> Result<()>;

    /// End the playback phase
    fn stop_playback(&self);

    /// Read the next captured chunk.
    ///
    /// Returns `None` once recording has stopped and the buffer is drained.
    ///
    /// # Errors
    ///
    /// Returns error if the capture device fails
    async fn read_chunk(&self) -> Result<Option<AudioFrame>>;

    /// Write playback audio bytes, preserving arrival order
    ///
    /// # Errors
    ///
    /// Returns error if the sink fails
    fn write(&self, audio: &[u8]) -> Result<()>;

    /// Set the playback volume percentage (0-100)
    fn set_volume(&self, percentage: u8);

    /// Current playback volume percentage
    fn volume(&self) -> u8;

    /// Sample rate in hertz for both directions
    fn sample_rate(&self) -> u32;

    /// Release capture and playback resources.
    ///
    /// The duplex may be reused afterwards: `start_recording` re-acquires
    /// the underlying devices.
    fn close(&self);
}
