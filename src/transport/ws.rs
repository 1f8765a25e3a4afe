//! WebSocket transport for the assistant streaming channel
//!
//! One WebSocket connection per turn. Requests and responses travel as JSON
//! text frames; a pair of pump tasks bridges the socket to the turn's
//! channel halves. The per-turn deadline is enforced on the receive side and
//! surfaces as a non-transient transport failure.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{AssistTransport, TurnChannel};
use crate::protocol::{AssistResponse, log_request_without_audio};
use crate::{Error, Result};

/// Buffered messages per channel half
const CHANNEL_CAPACITY: usize = 32;

/// WebSocket client for the assistant service
pub struct WsTransport {
    endpoint: String,
}

impl WsTransport {
    /// Create a transport dialing the given ws:// or wss:// endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AssistTransport for WsTransport {
    async fn open_turn(&self, deadline: Duration) -> Result<TurnChannel> {
        let (socket, _) = tokio_tungstenite::connect_async(&self.endpoint)
            .await
            .map_err(map_ws_error)?;
        tracing::debug!(endpoint = %self.endpoint, "turn channel opened");

        let (mut sink, mut stream) = socket.split();
        let (request_tx, mut request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Outgoing pump: serialize requests, half-close when the sequence ends
        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                log_request_without_audio(&request);
                let json = match serde_json::to_string(&request) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize request");
                        break;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        // Incoming pump: parse responses, enforce the turn deadline
        let deadline_secs = deadline.as_secs();
        tokio::spawn(async move {
            let turn_deadline = tokio::time::Instant::now() + deadline;
            loop {
                let frame =
                    match tokio::time::timeout_at(turn_deadline, stream.next()).await {
                        Err(_) => {
                            let _ = response_tx
                                .send(Err(Error::DeadlineExceeded(deadline_secs)))
                                .await;
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(e))) => {
                            let _ = response_tx.send(Err(map_ws_error(e))).await;
                            break;
                        }
                        Ok(Some(Ok(frame))) => frame,
                    };

                match frame {
                    Message::Text(text) => {
                        match serde_json::from_str::<AssistResponse>(&text) {
                            Ok(response) => {
                                if response_tx.send(Ok(response)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = response_tx
                                    .send(Err(Error::Transport(format!(
                                        "malformed response frame: {e}"
                                    ))))
                                    .await;
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    // Ping/pong handled by tungstenite; ignore binary frames
                    _ => {}
                }
            }
        });

        Ok(TurnChannel {
            requests: request_tx,
            responses: response_rx,
        })
    }
}

/// Map a WebSocket error onto the crate taxonomy.
///
/// Connection refusal and HTTP 502/503/504 denote the service being
/// temporarily unreachable and are classified transient; everything else is
/// a plain transport failure.
fn map_ws_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            ) =>
        {
            Error::Unavailable(io.to_string())
        }
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 502 | 503 | 504) =>
        {
            Error::Unavailable(format!("http status {}", response.status()))
        }
        other => Error::Transport(other.to_string()),
    }
}
