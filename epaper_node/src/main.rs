// ===============================================================================
// ESP32 E-Paper Information Node
// ===============================================================================
// Battery powered node that spends almost all of its time in deep sleep:
// - Wakes on a timer, listens briefly on an MQTT topic for key=value content
// - Redraws a 2.9" e-paper panel only when the content changed
// - Forces a redraw on cold boot and after a run of idle wakes
// - Keeps content and counters in RTC memory across sleeps
// ===============================================================================

use core::time::Duration;

use anyhow::Context;
use epaper_node_core::hal::PowerControl;
use epaper_node_core::{Devices, DutyCycleScheduler, NodeConfig, PersistentStore};
use esp_idf_hal::{gpio::InputPin, gpio::OutputPin, peripherals::Peripherals};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use log::*;

mod battery;
mod epaper;
mod network;
mod retained;
mod secrets;
mod system;

use crate::battery::BatterySensor;
use crate::epaper::EpaperDisplay;
use crate::network::{MqttChannel, WifiNetwork};
use crate::secrets::{Secrets, SECRETS_TOML};
use crate::system::{EspClock, EspPower};

// ===============================================================================
// CONFIGURATION
// ===============================================================================

/// Reads the `[node]` settings, falling back to defaults if they are unusable.
fn load_node_config() -> NodeConfig {
    match NodeConfig::from_toml_document(SECRETS_TOML) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid [node] settings, using defaults: {:#}", e);
            NodeConfig::default()
        }
    }
}

// ===============================================================================
// WAKE EPISODE
// ===============================================================================

/// Brings up the peripherals and runs one wake episode. Does not return on
/// success: the episode ends in deep sleep.
fn run(config: NodeConfig) -> anyhow::Result<()> {
    let secrets = Secrets::load()?;

    let region = retained::take().context("Retained region already in use")?;
    let store = PersistentStore::open(region);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let network = WifiNetwork::new(peripherals.modem, sys_loop, nvs, &secrets.wifi)?;
    let channel = MqttChannel::new(&secrets.mqtt);

    // Pin assignments (Waveshare e-Paper ESP32 driver board)
    let display = EpaperDisplay::new(
        peripherals.spi2,
        pins.gpio13.downgrade_output(),
        pins.gpio14.downgrade_output(),
        pins.gpio15.downgrade_output(),
        pins.gpio25.downgrade_input(),
        pins.gpio27.downgrade_output(),
        pins.gpio26.downgrade_output(),
    )?;
    let sensor = BatterySensor::new(peripherals.adc1, pins.gpio35)?;

    let devices = Devices {
        network,
        channel,
        display,
        sensor,
        power: EspPower,
        clock: EspClock,
    };

    let mut scheduler = DutyCycleScheduler::new(config, store, devices);
    scheduler.run_episode();
    Ok(())
}

// ===============================================================================
// MAIN PROGRAM
// ===============================================================================

fn main() {
    // Initialize ESP-IDF services
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== ESP32 E-Paper Node Starting ===");

    let config = load_node_config();
    let retry_after = config.timing.sleep_duration();

    if let Err(e) = run(config) {
        // the next wake retries setup from scratch
        error!("Setup failed: {:#}", e);
        let mut power = EspPower;
        power.deep_sleep(retry_after);
    }

    // only reached if deep sleep returned
    warn!("Deep sleep did not take, restarting");
    std::thread::sleep(Duration::from_secs(1));
    unsafe { esp_idf_sys::esp_restart() };
}
