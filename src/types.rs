use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the trend window; the configured capacity may be smaller.
pub const MAX_WINDOW_CAPACITY: usize = 16;
pub const ALERT_QUEUE_DEPTH: usize = 4;

/// The five relay-driven outputs of the tub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    Heater,
    Jets,
    Light,
    ColdBlower,
    HotBlower,
}

impl Line {
    pub const ALL: [Line; 5] = [
        Line::Heater,
        Line::Jets,
        Line::Light,
        Line::ColdBlower,
        Line::HotBlower,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Line::Heater => "heater",
            Line::Jets => "jets",
            Line::Light => "light",
            Line::ColdBlower => "cold_blower",
            Line::HotBlower => "hot_blower",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Line::Heater => 0,
            Line::Jets => 1,
            Line::Light => 2,
            Line::ColdBlower => 3,
            Line::HotBlower => 4,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest setpoints read from the remote control channel. There is no heater
/// field: the heater follows the target temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub target_temperature: f32,
    pub jets: bool,
    pub light: bool,
    pub cold_blower: bool,
    pub hot_blower: bool,
}

impl RemoteCommand {
    /// Non-heater line targets in the order they are applied.
    pub fn line_targets(&self) -> [(Line, bool); 4] {
        [
            (Line::Jets, self.jets),
            (Line::Light, self.light),
            (Line::ColdBlower, self.cold_blower),
            (Line::HotBlower, self.hot_blower),
        ]
    }
}

/// Snapshot of the tub published once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub temperature: f32,
    pub heater_on: bool,
    pub jets: bool,
    pub light: bool,
    pub cold_blower: bool,
    pub hot_blower: bool,
    pub status_message: String,
    pub heat_rate: f32,
    /// `Some(reason)` while the safety latch is tripped.
    pub tripped: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub message: String,
}

impl AlertRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}
