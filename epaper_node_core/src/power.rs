//! Battery voltage sampling and its mapping onto the level bar.

use log::*;

use crate::config::BatteryConfig;
use crate::hal::PowerSensor;

/// Battery voltage for one render. `None` when the reading failed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerState {
    volts: Option<f32>,
}

impl PowerState {
    /// Converts a reading taken behind the divider into battery volts.
    pub fn from_millivolts(millivolts: u32, divider_ratio: f32) -> Self {
        Self {
            volts: Some(millivolts as f32 / 1000.0 * divider_ratio),
        }
    }

    pub fn unknown() -> Self {
        Self { volts: None }
    }

    pub fn volts(&self) -> Option<f32> {
        self.volts
    }

    /// Reads the sensor once. A failed read degrades to an unknown state.
    pub fn sample<S: PowerSensor>(sensor: &mut S, config: &BatteryConfig) -> Self {
        match sensor.read_millivolts() {
            Ok(millivolts) => {
                let state = Self::from_millivolts(millivolts, config.divider_ratio);
                debug!(
                    "Battery: {} mV at divider, {:.2} V",
                    millivolts,
                    state.volts.unwrap_or(0.0)
                );
                state
            }
            Err(e) => {
                warn!("Battery read failed: {:#}", e);
                Self::unknown()
            }
        }
    }

    /// Bar fill in `0.0..=1.0`: the voltage clamped to the configured range
    /// and mapped linearly. Unknown voltage draws as empty.
    pub fn fill_fraction(&self, config: &BatteryConfig) -> f32 {
        let Some(volts) = self.volts else {
            return 0.0;
        };
        let span = config.max_volts - config.min_volts;
        if span <= 0.0 {
            return 0.0;
        }
        ((volts - config.min_volts) / span).clamp(0.0, 1.0)
    }

    pub fn percent(&self, config: &BatteryConfig) -> u8 {
        (self.fill_fraction(config) * 100.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::FixedSensor;

    fn config() -> BatteryConfig {
        BatteryConfig {
            divider_ratio: 2.0,
            min_volts: 3.3,
            max_volts: 4.2,
        }
    }

    #[test]
    fn test_divider_is_applied() {
        let state = PowerState::from_millivolts(1900, 2.0);
        assert!((state.volts().unwrap() - 3.8).abs() < 1e-4);
    }

    #[test]
    fn test_fill_is_clamped() {
        let config = config();
        assert_eq!(PowerState::from_millivolts(1000, 2.0).fill_fraction(&config), 0.0);
        assert_eq!(PowerState::from_millivolts(2500, 2.0).fill_fraction(&config), 1.0);
        assert_eq!(PowerState::from_millivolts(2100, 2.0).percent(&config), 100);
        assert_eq!(PowerState::from_millivolts(1650, 2.0).percent(&config), 0);
    }

    #[test]
    fn test_fill_is_linear() {
        let config = config();
        // 3.75 V is the midpoint of 3.3..4.2
        let fraction = PowerState::from_millivolts(1875, 2.0).fill_fraction(&config);
        assert!((fraction - 0.5).abs() < 1e-3);
        assert_eq!(PowerState::from_millivolts(1875, 2.0).percent(&config), 50);
    }

    #[test]
    fn test_unknown_is_empty() {
        assert_eq!(PowerState::unknown().fill_fraction(&config()), 0.0);
        assert_eq!(PowerState::default(), PowerState::unknown());
    }

    #[test]
    fn test_sample() {
        let config = config();
        let state = PowerState::sample(&mut FixedSensor::ok(2000), &config);
        assert!((state.volts().unwrap() - 4.0).abs() < 1e-4);

        let state = PowerState::sample(&mut FixedSensor::failing(), &config);
        assert_eq!(state, PowerState::unknown());
    }
}
