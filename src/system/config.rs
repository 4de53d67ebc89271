//! Centralized configuration management

use crate::regime::RegimeTable;
use crate::types::MAX_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TubConfig {
    pub control: ControlConfig,
    pub relays: RelayConfig,
    pub sensor: SensorConfig,
    pub thingspeak: ThingSpeakConfig,
    pub host: HostConfig,
    pub wifi: WifiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub sample_interval_secs: u64,
    pub window_capacity: usize,
    /// Hard limit; above this with the heater on the tub shuts down.
    pub temperature_limit_f: f32,
    /// Target until the first command arrives.
    pub default_target_f: f32,
    pub upper_window_f: f32,
    pub lower_window_f: f32,
    /// Cycles after heater-on at which the window is drained once.
    pub dip_delay_cycles: u32,
    /// Classification runs only once the cycle counter exceeds this.
    pub suitable_sample_size: u32,
    /// `None` waits for the command reply indefinitely.
    pub command_timeout_secs: Option<u64>,
    pub heating_rules: RegimeTable,
    pub cooling_rules: RegimeTable,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 60,
            window_capacity: 10,
            temperature_limit_f: 103.5,
            default_target_f: 102.0,
            upper_window_f: 0.5,
            lower_window_f: 0.5,
            dip_delay_cycles: 5,
            suitable_sample_size: 10,
            command_timeout_secs: None,
            heating_rules: RegimeTable::default_heating(),
            cooling_rules: RegimeTable::default_cooling(),
        }
    }
}

/// GPIO numbers per line plus polarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub heater: u32,
    pub jets: u32,
    pub light: u32,
    pub cold_blower: u32,
    pub hot_blower: u32,
    /// LOW energizes the relay.
    pub active_low: bool,
}

impl RelayConfig {
    /// Pin numbers in `Line::ALL` order.
    pub fn pins(&self) -> [u32; 5] {
        [
            self.heater,
            self.jets,
            self.light,
            self.cold_blower,
            self.hot_blower,
        ]
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heater: 5,
            jets: 6,
            light: 13,
            cold_blower: 19,
            hot_blower: 26,
            active_low: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub w1_devices_dir: PathBuf,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            w1_devices_dir: PathBuf::from("/sys/bus/w1/devices"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingSpeakConfig {
    pub base_url: String,
    pub control_channel_id: String,
    pub control_read_key: String,
    pub data_write_key: String,
    pub alert_write_key: String,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.thingspeak.com".to_string(),
            control_channel_id: String::new(),
            control_read_key: String::new(),
            data_write_key: String::new(),
            alert_write_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMode {
    /// In-process tub model, no hardware touched.
    Simulate,
    /// w1 thermometer and sysfs GPIO relays.
    Sysfs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub mode: HostMode,
    pub gpio_dir: PathBuf,
    /// JSON `RemoteCommand` re-read every cycle. Without one the default
    /// target is held with every auxiliary line off.
    pub command_file: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            mode: HostMode::Simulate,
            gpio_dir: PathBuf::from("/sys/class/gpio"),
            command_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "cannot read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "cannot parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TubConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TubConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let control = &self.control;
        if control.sample_interval_secs == 0 {
            return Err(ConfigError::Invalid("sample interval must be non-zero".into()));
        }
        if control.window_capacity == 0 || control.window_capacity > MAX_WINDOW_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "window capacity {} outside 1..={}",
                control.window_capacity, MAX_WINDOW_CAPACITY
            )));
        }
        if !(control.upper_window_f >= 0.0 && control.lower_window_f >= 0.0) {
            return Err(ConfigError::Invalid("hysteresis windows must be non-negative".into()));
        }
        if control.command_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("command timeout must be non-zero".into()));
        }
        control
            .heating_rules
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("heating rules: {}", e)))?;
        control
            .cooling_rules
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("cooling rules: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::{Bound, RegimeRule, RuleVerdict};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = TubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.sample_interval_secs, 60);
        assert_eq!(config.control.temperature_limit_f, 103.5);
        assert_eq!(config.relays.pins(), [5, 6, 13, 19, 26]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TubConfig::from_json(
            r#"{"control": {"default_target_f": 100.0}, "host": {"mode": "sysfs"}}"#,
        )
        .unwrap();
        assert_eq!(config.control.default_target_f, 100.0);
        assert_eq!(config.control.window_capacity, 10);
        assert_eq!(config.host.mode, HostMode::Sysfs);
        assert!(config.relays.active_low);
    }

    #[test]
    fn test_rejects_bad_window_capacity() {
        for capacity in [0, MAX_WINDOW_CAPACITY + 1] {
            let mut config = TubConfig::default();
            config.control.window_capacity = capacity;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_rejects_negative_window_and_zero_interval() {
        let mut config = TubConfig::default();
        config.control.lower_window_f = -0.1;
        assert!(config.validate().is_err());

        let mut config = TubConfig::default();
        config.control.sample_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_table_without_catch_all() {
        let mut config = TubConfig::default();
        config.control.cooling_rules = RegimeTable {
            rules: vec![RegimeRule {
                bound: Bound::Above(0.0),
                verdict: RuleVerdict::Status("Cooling normally".into()),
            }],
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.starts_with("cooling")));
    }

    #[test]
    fn test_rule_tables_round_trip_through_json() {
        let json = serde_json::to_string(&TubConfig::default()).unwrap();
        assert!(json.contains(r#""kind":"at_least""#));
        let parsed = TubConfig::from_json(&json).unwrap();
        assert_eq!(parsed, TubConfig::default());
    }

    #[test]
    fn test_load_reports_missing_and_bad_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hottub.json");
        assert!(matches!(TubConfig::load(&path), Err(ConfigError::Io(_))));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TubConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
