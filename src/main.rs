use anyhow::Context;
use embassy_executor::Spawner;
use hottub_rs::controller::ControlLoop;
use hottub_rs::hardware::{Actuator, TemperatureSensor};
use hottub_rs::runtime::WorkerLink;
use log::{error, info};
use std::convert::Infallible;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    #[cfg(target_os = "espidf")]
    esp_idf_svc::sys::link_patches();

    match run().await {
        Ok(never) => match never {},
        Err(e) => {
            error!("Fatal: {:#}", e);
            log::logger().flush();
            std::process::exit(1);
        }
    }
}

/// Runs the loop until it fails, then drives every output off.
async fn drive<S, A>(mut control: ControlLoop<S, A, WorkerLink>) -> anyhow::Result<Infallible>
where
    S: TemperatureSensor,
    A: Actuator,
{
    match control.run().await {
        Ok(never) => match never {},
        Err(e) => {
            match control.all_off() {
                Ok(()) => info!("All relay lines driven off"),
                Err(relay) => error!("CRITICAL: could not drive outputs off: {}", relay),
            }
            Err(e).context("control loop stopped")
        }
    }
}

#[cfg(not(target_os = "espidf"))]
async fn run() -> anyhow::Result<Infallible> {
    use hottub_rs::hardware::{gpio::SysfsPin, RelayBank, W1Thermometer};
    use hottub_rs::remote::local::{JsonCommandFile, LogPublisher, StaticCommands};
    use hottub_rs::remote::CommandSource;
    use hottub_rs::runtime::{start_workers, RemoteEndpoints};
    use hottub_rs::sim::{SimParams, SimulatedTub};
    use hottub_rs::system::{logging, HostMode, TubConfig};
    use hottub_rs::types::{AlertRecord, TelemetryRecord};
    use std::path::{Path, PathBuf};

    const CONFIG_ENV: &str = "HOTTUB_CONFIG";

    fn load_config() -> anyhow::Result<TubConfig> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from);
        match path {
            Some(path) => TubConfig::load(&path)
                .with_context(|| format!("loading {}", path.display())),
            None => {
                let config = TubConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn sysfs_pins(gpio_dir: &Path, numbers: [u32; 5]) -> anyhow::Result<[SysfsPin; 5]> {
        let open = |number: u32| {
            SysfsPin::output(gpio_dir, number).with_context(|| format!("setting up GPIO{}", number))
        };
        let [heater, jets, light, cold_blower, hot_blower] = numbers;
        Ok([
            open(heater)?,
            open(jets)?,
            open(light)?,
            open(cold_blower)?,
            open(hot_blower)?,
        ])
    }

    logging::init().context("installing logger")?;
    let config = load_config()?;
    info!("Starting hot tub controller ({:?} mode)", config.host.mode);

    let commands: Box<dyn CommandSource> = match &config.host.command_file {
        Some(path) => Box::new(JsonCommandFile::new(path)),
        None => Box::new(StaticCommands::idle(config.control.default_target_f)),
    };
    let endpoints = RemoteEndpoints {
        commands,
        telemetry: Box::new(LogPublisher::<TelemetryRecord>::new("telemetry")),
        alerts: Box::new(LogPublisher::<AlertRecord>::new("alert")),
    };
    let (link, _workers) = start_workers(endpoints, config.control.command_timeout_secs)
        .context("starting remote workers")?;

    let active_low = config.relays.active_low;
    match config.host.mode {
        HostMode::Simulate => {
            let tub = SimulatedTub::new(SimParams {
                minutes_per_sample: config.control.sample_interval_secs as f32 / 60.0,
                active_low,
                ..SimParams::default()
            });
            let relays = RelayBank::new(tub.pins(), active_low)?;
            drive(ControlLoop::new(tub.sensor(), relays, link, config.control)).await
        }
        HostMode::Sysfs => {
            let pins = sysfs_pins(&config.host.gpio_dir, config.relays.pins())?;
            let relays = RelayBank::new(pins, active_low)?;
            let thermometer = W1Thermometer::new(config.sensor.w1_devices_dir.clone());
            drive(ControlLoop::new(thermometer, relays, link, config.control)).await
        }
    }
}

#[cfg(target_os = "espidf")]
async fn run() -> anyhow::Result<Infallible> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::gpio::OutputPin;
    use esp_idf_svc::hal::onewire::OWDriver;
    use esp_idf_svc::hal::prelude::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use hottub_rs::hardware::esp::{esp_relay_bank, OneWireThermometer};
    use hottub_rs::remote::esp_http::EspHttpGet;
    use hottub_rs::remote::thingspeak::ThingSpeakClient;
    use hottub_rs::runtime::{start_workers, RemoteEndpoints};
    use hottub_rs::system::{wifi, TubConfig};
    use std::time::Duration;

    const HTTP_TIMEOUT_SECS: u64 = 30;

    /// Defaults plus compile-time credentials. The relay numbers record the
    /// pins wired below.
    fn esp_config() -> TubConfig {
        let mut config = TubConfig::default();
        config.relays.heater = 25;
        config.relays.jets = 26;
        config.relays.light = 27;
        config.relays.cold_blower = 32;
        config.relays.hot_blower = 33;
        let set = |field: &mut String, value: Option<&str>| {
            if let Some(value) = value {
                *field = value.to_string();
            }
        };
        set(&mut config.wifi.ssid, option_env!("HOTTUB_WIFI_SSID"));
        set(&mut config.wifi.password, option_env!("HOTTUB_WIFI_PASS"));
        set(&mut config.thingspeak.control_channel_id, option_env!("HOTTUB_TS_CHANNEL"));
        set(&mut config.thingspeak.control_read_key, option_env!("HOTTUB_TS_READ_KEY"));
        set(&mut config.thingspeak.data_write_key, option_env!("HOTTUB_TS_DATA_KEY"));
        set(&mut config.thingspeak.alert_write_key, option_env!("HOTTUB_TS_ALERT_KEY"));
        config
    }

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("Starting hot tub controller");

    let config = esp_config();
    config.validate()?;

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let _wifi = wifi::connect(peripherals.modem, sys_loop, nvs, &config.wifi).await?;

    let pins = peripherals.pins;
    let relays = esp_relay_bank(
        [
            pins.gpio25.downgrade_output(),
            pins.gpio26.downgrade_output(),
            pins.gpio27.downgrade_output(),
            pins.gpio32.downgrade_output(),
            pins.gpio33.downgrade_output(),
        ],
        config.relays.active_low,
    )?;
    let thermometer = OneWireThermometer::new(OWDriver::new(pins.gpio4)?);

    let client = || {
        ThingSpeakClient::new(
            config.thingspeak.clone(),
            EspHttpGet::new(Duration::from_secs(HTTP_TIMEOUT_SECS)),
        )
    };
    let endpoints = RemoteEndpoints {
        commands: Box::new(client()),
        telemetry: Box::new(client()),
        alerts: Box::new(client()),
    };
    let (link, _workers) = start_workers(endpoints, config.control.command_timeout_secs)
        .context("starting remote workers")?;

    drive(ControlLoop::new(thermometer, relays, link, config.control)).await
}
