//! Host-side stand-ins for the remote service: commands from a JSON file
//! edited by hand (or by another process), records written to the log.

use super::{CommandFetchError, CommandSource, Publish, PublishError};
use crate::types::RemoteCommand;
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Re-reads a JSON-encoded [`RemoteCommand`] every cycle.
pub struct JsonCommandFile {
    path: PathBuf,
}

impl JsonCommandFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CommandSource for JsonCommandFile {
    fn fetch_commands(&mut self) -> Result<RemoteCommand, CommandFetchError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            CommandFetchError::Transport(format!("{}: {}", self.path.display(), e))
        })?;
        let command: RemoteCommand = serde_json::from_str(&raw)
            .map_err(|e| CommandFetchError::Malformed(e.to_string()))?;
        debug!("Read command file {}: {:?}", self.path.display(), command);
        Ok(command)
    }
}

/// Always answers with the same command.
pub struct StaticCommands {
    command: RemoteCommand,
}

impl StaticCommands {
    pub fn new(command: RemoteCommand) -> Self {
        Self { command }
    }

    /// Default target with every auxiliary line off.
    pub fn idle(target_temperature: f32) -> Self {
        Self::new(RemoteCommand {
            target_temperature,
            jets: false,
            light: false,
            cold_blower: false,
            hot_blower: false,
        })
    }
}

impl CommandSource for StaticCommands {
    fn fetch_commands(&mut self) -> Result<RemoteCommand, CommandFetchError> {
        Ok(self.command.clone())
    }
}

/// Writes each record as one JSON object under the given log target.
pub struct LogPublisher<R> {
    target: &'static str,
    _record: PhantomData<fn(&R)>,
}

impl<R> LogPublisher<R> {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            _record: PhantomData,
        }
    }
}

impl<R: Serialize> Publish<R> for LogPublisher<R> {
    fn publish(&mut self, record: &R) -> Result<(), PublishError> {
        let json = serde_json::to_string(record).map_err(|e| PublishError::Transport(e.to_string()))?;
        info!(target: self.target, "{}", json);
        Ok(())
    }
}
