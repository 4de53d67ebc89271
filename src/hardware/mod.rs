//! Sensor and actuator seams plus their concrete drivers.

pub mod ds18b20;
pub mod gpio;
pub mod relay;
pub mod thermometer;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use relay::{RelayBank, RelayError};
pub use thermometer::W1Thermometer;

use crate::types::Line;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    NoSensor,
    Io(String),
    Malformed(String),
    CrcFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NoSensor => write!(f, "no temperature sensor found"),
            SensorError::Io(msg) => write!(f, "sensor I/O error: {}", msg),
            SensorError::Malformed(msg) => write!(f, "malformed sensor reading: {}", msg),
            SensorError::CrcFailed => write!(f, "sensor CRC check failed"),
        }
    }
}

impl std::error::Error for SensorError {}

pub trait TemperatureSensor {
    /// Water temperature in degrees Fahrenheit.
    fn read_temperature_f(&mut self) -> Result<f32, SensorError>;
}

/// Digital output lines. Reads return the state actually driven on the
/// line, which is the source of truth for heater-on.
pub trait Actuator {
    fn set_line(&mut self, line: Line, on: bool) -> Result<(), RelayError>;

    fn read_line(&self, line: Line) -> Result<bool, RelayError>;

    fn all_off(&mut self) -> Result<(), RelayError> {
        for line in Line::ALL {
            self.set_line(line, false)?;
        }
        Ok(())
    }
}
