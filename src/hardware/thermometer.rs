//! DS18B20 probe read through the Linux `w1` sysfs tree.

use super::{SensorError, TemperatureSensor};
use crate::types::celsius_to_fahrenheit;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// DS18B20 devices enumerate with family code 28.
const DS18B20_PREFIX: &str = "28-";

pub struct W1Thermometer {
    devices_dir: PathBuf,
}

impl W1Thermometer {
    pub fn new(devices_dir: impl Into<PathBuf>) -> Self {
        Self {
            devices_dir: devices_dir.into(),
        }
    }

    /// The first probe in lexical order; the tub has exactly one.
    pub fn find_sensor(&self) -> Result<PathBuf, SensorError> {
        let entries = fs::read_dir(&self.devices_dir).map_err(|e| {
            SensorError::Io(format!("{}: {}", self.devices_dir.display(), e))
        })?;
        let mut sensors: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(DS18B20_PREFIX))
            .map(|entry| entry.path())
            .collect();
        sensors.sort();
        sensors.into_iter().next().ok_or(SensorError::NoSensor)
    }

    pub fn read_celsius(&self) -> Result<f32, SensorError> {
        let sensor = self.find_sensor()?;
        read_slave_file(&sensor.join("w1_slave"))
    }
}

impl TemperatureSensor for W1Thermometer {
    fn read_temperature_f(&mut self) -> Result<f32, SensorError> {
        let celsius = self.read_celsius()?;
        debug!("DS18B20 temperature: {:.3}C", celsius);
        Ok(celsius_to_fahrenheit(celsius))
    }
}

fn read_slave_file(path: &Path) -> Result<f32, SensorError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| SensorError::Io(format!("{}: {}", path.display(), e)))?;
    parse_w1_slave(&raw)
}

/// Parses the two-line `w1_slave` format:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(raw: &str) -> Result<f32, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("empty reading".to_string()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::CrcFailed);
    }

    let data_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("missing data line".to_string()))?;
    let (_, milli) = data_line
        .rsplit_once("t=")
        .ok_or_else(|| SensorError::Malformed(format!("no t= in {:?}", data_line)))?;
    let milli: i32 = milli
        .trim()
        .parse()
        .map_err(|_| SensorError::Malformed(format!("bad temperature {:?}", milli)))?;
    Ok(milli as f32 / 1000.0)
}
