use super::Actuator;
use crate::types::Line;
use embedded_hal::digital::v2::StatefulOutputPin;
use log::{error, info};
use std::fmt::Debug;

/// Relay board driven through five GPIO outputs, one per [`Line`].
///
/// Typical opto-isolated boards energize the relay on LOW, so `active_low`
/// is the usual setting.
pub struct RelayBank<P> {
    pins: [P; 5],
    active_low: bool,
}

impl<P> RelayBank<P>
where
    P: StatefulOutputPin,
    P::Error: Debug,
{
    /// `pins` are in [`Line::ALL`] order. Every line starts OFF.
    pub fn new(pins: [P; 5], active_low: bool) -> Result<Self, RelayError> {
        let mut bank = Self { pins, active_low };
        bank.all_off().map_err(|e| {
            RelayError::Gpio(format!("Failed to set initial off state: {}", e))
        })?;

        info!(
            "Relay bank initialized ({})",
            if active_low { "active low" } else { "active high" }
        );
        Ok(bank)
    }

    fn drive(&mut self, line: Line, on: bool) -> Result<(), P::Error> {
        let high = on != self.active_low;
        let pin = &mut self.pins[line.index()];
        if high {
            pin.set_high()
        } else {
            pin.set_low()
        }
    }

    /// Drop every line without stopping at the first failure.
    pub fn turn_off_immediately(&mut self) -> Result<(), RelayError> {
        let mut failed = None;
        for line in Line::ALL {
            if let Err(e) = self.drive(line, false) {
                error!("CRITICAL: Failed to turn off {}: {:?}", line, e);
                failed = Some(line);
            }
        }
        match failed {
            Some(line) => Err(RelayError::Gpio(format!("Emergency off failed on {}", line))),
            None => Ok(()),
        }
    }
}

impl<P> Actuator for RelayBank<P>
where
    P: StatefulOutputPin,
    P::Error: Debug,
{
    fn set_line(&mut self, line: Line, on: bool) -> Result<(), RelayError> {
        self.drive(line, on).map_err(|e| {
            RelayError::Gpio(format!(
                "Failed to turn {} {}: {:?}",
                line,
                if on { "ON" } else { "OFF" },
                e
            ))
        })
    }

    fn read_line(&self, line: Line) -> Result<bool, RelayError> {
        let high = self.pins[line.index()]
            .is_set_high()
            .map_err(|e| RelayError::Gpio(format!("Failed to read {}: {:?}", line, e)))?;
        Ok(high != self.active_low)
    }

    fn all_off(&mut self) -> Result<(), RelayError> {
        self.turn_off_immediately()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    Gpio(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Gpio(msg) => write!(f, "GPIO error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::v2::OutputPin;
    use std::convert::Infallible;

    #[derive(Default)]
    struct FakePin {
        high: bool,
    }

    impl OutputPin for FakePin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for FakePin {
        fn is_set_high(&self) -> Result<bool, Self::Error> {
            Ok(self.high)
        }

        fn is_set_low(&self) -> Result<bool, Self::Error> {
            Ok(!self.high)
        }
    }

    fn pins() -> [FakePin; 5] {
        Default::default()
    }

    #[test]
    fn test_active_low_starts_with_pins_high() {
        let bank = RelayBank::new(pins(), true).unwrap();
        assert!(bank.pins.iter().all(|pin| pin.high));
        for line in Line::ALL {
            assert!(!bank.read_line(line).unwrap());
        }
    }

    #[test]
    fn test_active_low_on_drives_pin_low() {
        let mut bank = RelayBank::new(pins(), true).unwrap();
        bank.set_line(Line::Heater, true).unwrap();
        assert!(!bank.pins[Line::Heater.index()].high);
        assert!(bank.read_line(Line::Heater).unwrap());
        assert!(!bank.read_line(Line::Jets).unwrap());
    }

    #[test]
    fn test_active_high_polarity() {
        let mut bank = RelayBank::new(pins(), false).unwrap();
        bank.set_line(Line::Light, true).unwrap();
        assert!(bank.pins[Line::Light.index()].high);
        assert!(bank.read_line(Line::Light).unwrap());
    }

    #[test]
    fn test_all_off() {
        let mut bank = RelayBank::new(pins(), true).unwrap();
        for line in Line::ALL {
            bank.set_line(line, true).unwrap();
        }
        bank.all_off().unwrap();
        for line in Line::ALL {
            assert!(!bank.read_line(line).unwrap());
        }
    }
}
