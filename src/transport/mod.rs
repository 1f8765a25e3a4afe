//! Streaming transport to the assistant service
//!
//! The turn executor never touches a socket: it sends [`AssistRequest`]s and
//! receives [`AssistResponse`]s through a [`TurnChannel`] opened per turn by
//! an [`AssistTransport`]. Request transmission and response consumption run
//! concurrently over the one bidirectional channel.

mod ws;

pub use ws::WsTransport;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::protocol::{AssistRequest, AssistResponse};

/// The two halves of one turn's bidirectional exchange.
///
/// Dropping `requests` marks the outgoing sequence as exhausted; `responses`
/// yields messages in arrival order and ends when the service closes the
/// turn or a transport error occurs.
pub struct TurnChannel {
    /// Outgoing request half
    pub requests: mpsc::Sender<AssistRequest>,
    /// Incoming response half
    pub responses: mpsc::Receiver<Result<AssistResponse>>,
}

/// Factory for per-turn bidirectional channels
#[async_trait]
pub trait AssistTransport: Send + Sync {
    /// Open the channel for one turn, bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unavailable` when the service cannot be reached
    /// (transient), or `Error::Transport` for any other connection failure
    async fn open_turn(&self, deadline: Duration) -> Result<TurnChannel>;
}
