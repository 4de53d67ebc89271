//! ESP32 drivers: DS18B20 over the RMT 1-Wire bus and relays on GPIO.

use super::ds18b20::scratchpad_celsius;
use super::{RelayBank, RelayError, SensorError, TemperatureSensor};
use crate::types::celsius_to_fahrenheit;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::hal::onewire::{OWAddress, OWCommand, OWDriver};
use esp_idf_svc::sys::EspError;
use log::{info, warn};

const CONVERT_TEMP: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;
/// Worst-case 12-bit conversion time.
const CONVERSION_MS: u32 = 800;

pub type EspRelayBank = RelayBank<PinDriver<'static, AnyOutputPin, Output>>;

/// Builds the relay bank from five output pins in `Line::ALL` order.
pub fn esp_relay_bank(pins: [AnyOutputPin; 5], active_low: bool) -> Result<EspRelayBank, RelayError> {
    let [heater, jets, light, cold_blower, hot_blower] = pins;
    let output = |pin: AnyOutputPin| {
        PinDriver::output(pin).map_err(|e| RelayError::Gpio(format!("Failed to configure pin: {:?}", e)))
    };
    RelayBank::new(
        [
            output(heater)?,
            output(jets)?,
            output(light)?,
            output(cold_blower)?,
            output(hot_blower)?,
        ],
        active_low,
    )
}

pub struct OneWireThermometer {
    bus: OWDriver<'static>,
    device: Option<OWAddress>,
}

impl OneWireThermometer {
    pub fn new(bus: OWDriver<'static>) -> Self {
        Self { bus, device: None }
    }

    fn device(&mut self) -> Result<OWAddress, SensorError> {
        if let Some(device) = self.device {
            return Ok(device);
        }
        let found = self
            .bus
            .search()
            .map_err(io_error)?
            .next()
            .ok_or(SensorError::NoSensor)?
            .map_err(io_error)?;
        info!("Found 1-Wire device {:016x}", found.address());
        self.device = Some(found);
        Ok(found)
    }

    fn send_command(&mut self, device: &OWAddress, command: u8) -> Result<(), EspError> {
        let mut buf = [0u8; 10];
        buf[0] = OWCommand::MatchRom as u8;
        buf[1..9].copy_from_slice(&device.address().to_le_bytes());
        buf[9] = command;
        self.bus.write(&buf)
    }

    fn read_scratchpad(&mut self, device: &OWAddress) -> Result<[u8; 9], EspError> {
        self.bus.reset()?;
        self.send_command(device, CONVERT_TEMP)?;
        FreeRtos::delay_ms(CONVERSION_MS);

        self.bus.reset()?;
        self.send_command(device, READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; 9];
        self.bus.read(&mut scratchpad)?;
        Ok(scratchpad)
    }
}

impl TemperatureSensor for OneWireThermometer {
    fn read_temperature_f(&mut self) -> Result<f32, SensorError> {
        let device = self.device()?;
        let scratchpad = self.read_scratchpad(&device).map_err(|e| {
            // Rediscover on the next read in case the probe was re-seated.
            self.device = None;
            io_error(e)
        })?;
        let celsius = scratchpad_celsius(&scratchpad).map_err(|e| {
            warn!("DS18B20 scratchpad rejected: {:02x?}", scratchpad);
            e
        })?;
        Ok(celsius_to_fahrenheit(celsius))
    }
}

fn io_error(e: EspError) -> SensorError {
    SensorError::Io(format!("1-Wire: {:?}", e))
}
