//! Node settings.
//!
//! The settings live in the `[node]` table of the same `secrets.toml` that
//! carries the Wi-Fi and MQTT credentials. Every field is optional and falls
//! back to the defaults below.

use core::time::Duration;

use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::parser::{ContentParser, DEFAULT_SEPARATOR};

/// Listen window after an ordinary wake, and the short sleep after a forced redraw.
pub const WAKEUP_TIME_SECS: u64 = 10;
/// Deep-sleep duration after a listen episode.
pub const SLEEP_SECONDS: u64 = 600;
/// Ordinary wakes tolerated before the next wake forces a redraw.
pub const REDRAW_WAKE_THRESHOLD: u32 = 48;
/// Fixed backoff between connection attempts.
pub const CONNECT_RETRY_MS: u64 = 500;
/// Delay between message polls inside the listen window.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Root of the `[node]` table.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub timing: TimingConfig,
    pub battery: BatteryConfig,
    pub layout: LayoutConfig,
    pub content: ContentConfig,
}

/// Wake episode timing.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub wakeup_time_secs: u64,
    pub sleep_seconds: u64,
    pub redraw_wake_threshold: u32,
    pub connect_retry_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wakeup_time_secs: WAKEUP_TIME_SECS,
            sleep_seconds: SLEEP_SECONDS,
            redraw_wake_threshold: REDRAW_WAKE_THRESHOLD,
            connect_retry_ms: CONNECT_RETRY_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl TimingConfig {
    pub fn wakeup_time(&self) -> Duration {
        Duration::from_secs(self.wakeup_time_secs)
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Battery divider and the voltage range mapped onto the level bar.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BatteryConfig {
    /// Battery volts per volt measured at the ADC pin.
    pub divider_ratio: f32,
    /// Voltage drawn as an empty bar.
    pub min_volts: f32,
    /// Voltage drawn as a full bar.
    pub max_volts: f32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            divider_ratio: 2.0,
            min_volts: 3.3,
            max_volts: 4.2,
        }
    }
}

/// Pixel geometry of the rendered frame.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    pub margin: u32,
    pub headline_height: u32,
    pub row_height: u32,
    pub battery_bar_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: 4,
            headline_height: 28,
            row_height: 22,
            battery_bar_height: 10,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ContentConfig {
    /// Character between `key=value` pairs.
    pub separator: char,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
        }
    }
}

/// The part of `secrets.toml` this crate cares about.
#[derive(Deserialize, Debug, Default)]
struct Document {
    #[serde(default)]
    node: NodeConfig,
}

impl NodeConfig {
    /// Reads the `[node]` table out of a whole `secrets.toml` document.
    ///
    /// Other tables are ignored. A missing `[node]` table yields the defaults.
    pub fn from_toml_document(text: &str) -> anyhow::Result<Self> {
        let document: Document = toml::from_str(text).context("Error parsing [node] settings")?;
        document.node.validate()?;
        Ok(document.node)
    }

    /// Rejects settings the scheduler or renderer cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let timing = &self.timing;
        ensure!(timing.wakeup_time_secs > 0, "timing.wakeup_time_secs must be positive");
        ensure!(timing.sleep_seconds > 0, "timing.sleep_seconds must be positive");
        ensure!(timing.poll_interval_ms > 0, "timing.poll_interval_ms must be positive");

        let battery = &self.battery;
        ensure!(
            battery.divider_ratio > 0.0,
            "battery.divider_ratio must be positive, got {}",
            battery.divider_ratio
        );
        ensure!(
            battery.min_volts < battery.max_volts,
            "battery.min_volts ({}) must be below battery.max_volts ({})",
            battery.min_volts,
            battery.max_volts
        );

        ensure!(self.layout.row_height > 0, "layout.row_height must be positive");
        ensure!(
            self.content.separator != '=',
            "content.separator cannot be the key/value delimiter '='"
        );
        Ok(())
    }

    pub fn parser(&self) -> ContentParser {
        ContentParser::new(self.content.separator)
    }
}
