//! Remote command source and telemetry/alert sinks.
//!
//! These are blocking interfaces; the runtime workers own them on their own
//! threads so a slow round-trip never stalls the control task except at the
//! command rendezvous.

pub mod local;
pub mod thingspeak;

#[cfg(target_os = "espidf")]
pub mod esp_http;

use crate::types::RemoteCommand;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandFetchError {
    Transport(String),
    RateLimited,
    Status(u16),
    Malformed(String),
    Timeout,
    /// The fetch worker is no longer answering requests.
    WorkerGone,
}

impl fmt::Display for CommandFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFetchError::Transport(msg) => write!(f, "command fetch transport error: {}", msg),
            CommandFetchError::RateLimited => write!(f, "command fetch rate limited"),
            CommandFetchError::Status(code) => write!(f, "command fetch returned HTTP {}", code),
            CommandFetchError::Malformed(msg) => write!(f, "malformed command response: {}", msg),
            CommandFetchError::Timeout => write!(f, "command fetch timed out"),
            CommandFetchError::WorkerGone => write!(f, "command worker stopped"),
        }
    }
}

impl std::error::Error for CommandFetchError {}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishError {
    Transport(String),
    RateLimited,
    Status(u16),
    /// The service accepted the request but did not store the entry.
    Rejected,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Transport(msg) => write!(f, "publish transport error: {}", msg),
            PublishError::RateLimited => write!(f, "publish rate limited"),
            PublishError::Status(code) => write!(f, "publish returned HTTP {}", code),
            PublishError::Rejected => write!(f, "publish rejected by service"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Source of the latest [`RemoteCommand`]. One call per control cycle.
pub trait CommandSource: Send {
    fn fetch_commands(&mut self) -> Result<RemoteCommand, CommandFetchError>;
}

/// Write-only sink for records of type `R`.
pub trait Publish<R>: Send {
    fn publish(&mut self, record: &R) -> Result<(), PublishError>;
}
