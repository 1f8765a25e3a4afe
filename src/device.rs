//! Device action dispatch
//!
//! Responses may carry a serialized device-action payload. The executor
//! parses it into [`DeviceActionRequest`]s and hands them to a
//! [`DeviceDispatcher`]: an explicit command-to-handler map built once at
//! startup. Handlers run asynchronously on spawned tasks; the executor only
//! waits on the returned [`PendingCompletion`]s.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// A structured command extracted from a response's device-action payload
#[derive(Debug, Clone)]
pub struct DeviceActionRequest {
    /// Action identifier (e.g. "action.devices.commands.OnOff")
    pub command: String,
    /// Named parameters for the handler
    pub params: serde_json::Map<String, Value>,
}

impl DeviceActionRequest {
    /// Parse the serialized payload carried by a response.
    ///
    /// Expected shape: `{"commands": [{"command": "...", "params": {...}}]}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceAction` if the payload is not parseable as
    /// structured action data — a protocol mismatch, fatal for the turn
    pub fn parse_payload(payload: &str) -> Result<Vec<Self>> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| Error::DeviceAction(format!("malformed payload: {e}")))?;

        let commands = value
            .get("commands")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::DeviceAction("payload missing commands array".to_string()))?;

        commands
            .iter()
            .map(|entry| {
                let command = entry
                    .get("command")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::DeviceAction("command entry missing identifier".to_string())
                    })?
                    .to_string();
                let params = entry
                    .get("params")
                    .map(|p| {
                        p.as_object().cloned().ok_or_else(|| {
                            Error::DeviceAction(format!("params for {command} not an object"))
                        })
                    })
                    .transpose()?
                    .unwrap_or_default();
                Ok(Self { command, params })
            })
            .collect()
    }
}

type Handler =
    Arc<dyn Fn(serde_json::Map<String, Value>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Handle to in-flight asynchronous device-action work
pub struct PendingCompletion {
    command: String,
    handle: JoinHandle<Result<()>>,
}

impl PendingCompletion {
    /// Wait for the handler to finish, surfacing its failure if any
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or `Error::DeviceAction` if its task
    /// panicked
    pub async fn wait(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| Error::DeviceAction(format!("handler for {} panicked: {e}", self.command)))?
    }
}

/// Maps action identifiers to registered handlers
#[derive(Default)]
pub struct DeviceDispatcher {
    handlers: HashMap<String, Handler>,
}

impl DeviceDispatcher {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an action identifier
    #[must_use]
    pub fn register<F, Fut>(mut self, command: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handlers
            .insert(command.into(), Arc::new(move |params| Box::pin(handler(params))));
        self
    }

    /// Dispatch a parsed action request.
    ///
    /// A matching handler is spawned asynchronously and its completion handle
    /// returned. Unmatched identifiers are a no-op.
    #[must_use]
    pub fn handle(&self, request: DeviceActionRequest) -> Vec<PendingCompletion> {
        let Some(handler) = self.handlers.get(&request.command) else {
            tracing::debug!(command = %request.command, "no handler registered, ignoring");
            return Vec::new();
        };

        tracing::info!(command = %request.command, "dispatching device action");
        let future = handler(request.params);
        vec![PendingCompletion {
            command: request.command,
            handle: tokio::spawn(future),
        }]
    }
}
