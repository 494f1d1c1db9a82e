use epaper_node_core::hal::PowerSensor;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::Gpio35;

/// Samples averaged per reading.
const SAMPLES: u32 = 8;

/// Battery voltage divider on GPIO35 (ADC1 channel 7).
pub struct BatterySensor {
    channel: AdcChannelDriver<'static, Gpio35, AdcDriver<'static, ADC1>>,
}

impl BatterySensor {
    pub fn new(adc: ADC1, pin: Gpio35) -> anyhow::Result<Self> {
        let adc = AdcDriver::new(adc)?;
        // 11 dB covers the full divided range of a Li-ion cell
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(adc, pin, &config)?;
        Ok(Self { channel })
    }
}

impl PowerSensor for BatterySensor {
    /// Millivolts at the ADC pin, before the divider is undone.
    fn read_millivolts(&mut self) -> anyhow::Result<u32> {
        let mut total = 0u32;
        for _ in 0..SAMPLES {
            total += u32::from(self.channel.read()?);
        }
        Ok(total / SAMPLES)
    }
}
