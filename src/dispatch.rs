//! Memoizing command dispatch.
//!
//! [`CommandDispatcher::send`] runs a command on a live session and keeps
//! the result in the injected [`CommandCache`]: asking the same session the
//! same command again returns the first answer without touching the device.
//! Output is decoded as JSON when it parses; anything else is kept as text.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::cache::CommandCache;
use crate::session::{CliSession, SessionError};

/// Errors raised while dispatching commands
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Expected JSON output from '{command}'")]
    NotJson { command: String },
}

/// Output of one device command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Json(Value),
    Text(String),
}

impl CommandOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CommandOutput::Json(value) => Some(value),
            CommandOutput::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CommandOutput::Text(text) => Some(text),
            CommandOutput::Json(_) => None,
        }
    }

    /// Output rendered as text, serializing JSON when necessary
    pub fn text(&self) -> String {
        match self {
            CommandOutput::Text(text) => text.clone(),
            CommandOutput::Json(value) => value.to_string(),
        }
    }

    /// Decoded JSON or a [`DispatchError::NotJson`] naming the command
    pub fn json_or_err(self, command: &str) -> Result<Value, DispatchError> {
        match self {
            CommandOutput::Json(value) => Ok(value),
            CommandOutput::Text(_) => Err(DispatchError::NotJson {
                command: command.to_string(),
            }),
        }
    }
}

fn expects_json(command: &str) -> bool {
    command.contains("| json")
}

/// Decode raw device output: JSON when it parses, text otherwise.
///
/// Empty output is returned as empty text.
pub fn decode_output(command: &str, raw: String) -> CommandOutput {
    if raw.trim().is_empty() {
        if expects_json(command) {
            warn!(command, "Empty output, keeping raw text");
        }
        return CommandOutput::Text(raw);
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => CommandOutput::Json(value),
        Err(e) => {
            if expects_json(command) {
                warn!(command, error = %e, "Output is not valid JSON, keeping raw text");
            } else {
                trace!(command, "Plain text output");
            }
            CommandOutput::Text(raw)
        }
    }
}

/// Sends commands through a shared cache
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    cache: Arc<CommandCache>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(CommandCache::default()))
    }
}

impl CommandDispatcher {
    pub fn new(cache: Arc<CommandCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CommandCache> {
        &self.cache
    }

    /// Run `command`, returning the cached output for repeated calls
    pub async fn send(
        &self,
        session: &mut dyn CliSession,
        command: &str,
    ) -> Result<CommandOutput, DispatchError> {
        if let Some(output) = self.cache.get(session.identity(), command) {
            return Ok(output);
        }
        self.send_fresh(session, command).await
    }

    /// Run `command` on the device regardless of the cache, refreshing it
    pub async fn send_fresh(
        &self,
        session: &mut dyn CliSession,
        command: &str,
    ) -> Result<CommandOutput, DispatchError> {
        debug!(session = session.identity(), command, "Sending command");
        let raw = session.send_command(command).await?;
        let output = decode_output(command, raw);
        self.cache.insert(session.identity(), command, output.clone());
        Ok(output)
    }

    /// Run a `| json` command and require JSON output
    pub async fn send_json(
        &self,
        session: &mut dyn CliSession,
        command: &str,
    ) -> Result<Value, DispatchError> {
        self.send(session, command).await?.json_or_err(command)
    }

    /// Run a command and return its output as text
    pub async fn send_text(
        &self,
        session: &mut dyn CliSession,
        command: &str,
    ) -> Result<String, DispatchError> {
        Ok(self.send(session, command).await?.text())
    }
}
