//! GPIO output through the Linux sysfs interface (`/sys/class/gpio`).

use embedded_hal::digital::v2::{OutputPin, StatefulOutputPin};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct SysfsPin {
    number: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Exports the pin if the kernel has not already, then configures it as
    /// an output. The initial level is whatever the kernel picks; callers
    /// drive it explicitly right after.
    pub fn output(gpio_root: &Path, number: u32) -> io::Result<Self> {
        let pin_dir = gpio_root.join(format!("gpio{}", number));
        if !pin_dir.exists() {
            debug!("Exporting GPIO{}", number);
            fs::write(gpio_root.join("export"), number.to_string())?;
        }
        if !pin_dir.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("GPIO{} did not appear under {}", number, gpio_root.display()),
            ));
        }
        fs::write(pin_dir.join("direction"), "out")?;

        Ok(Self {
            number,
            value_path: pin_dir.join("value"),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    fn write_level(&self, high: bool) -> io::Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
    }

    fn read_level(&self) -> io::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected GPIO{} value {:?}", self.number, other),
            )),
        }
    }
}

impl OutputPin for SysfsPin {
    type Error = io::Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

impl StatefulOutputPin for SysfsPin {
    fn is_set_high(&self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_set_low(&self) -> Result<bool, Self::Error> {
        self.read_level().map(|high| !high)
    }
}
