//! Wi-Fi station bring-up for the ESP32 build.

use crate::system::config::WifiConfig;
use anyhow::{anyhow, Context};
use embassy_time::{Duration, Timer};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};

const CONNECT_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 2000;

/// Connects in station mode. The returned driver must be kept alive for the
/// connection to stay up.
pub async fn connect(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &WifiConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
    let mut wifi = BlockingWifi::wrap(wifi, sys_loop)?;

    let auth_method = if config.password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;
    info!("Wi-Fi started, connecting to `{}`", config.ssid);

    for attempt in 1..=CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|_| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("Wi-Fi connected (attempt {})", attempt);
                return Ok(wifi);
            }
            Err(e) => {
                warn!("Wi-Fi connect failed (attempt {}): {:?}", attempt, e);
                if attempt < CONNECT_ATTEMPTS {
                    let _ = wifi.disconnect();
                    Timer::after(Duration::from_millis(RETRY_DELAY_MS)).await;
                }
            }
        }
    }

    error!("Wi-Fi unavailable after {} attempts", CONNECT_ATTEMPTS);
    Err(anyhow!("could not join `{}`", config.ssid)).context("Wi-Fi station mode")
}
