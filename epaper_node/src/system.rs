use core::time::Duration;

use epaper_node_core::hal::{Clock, PowerControl, WakeCause};
use esp_idf_hal::delay::FreeRtos;
use log::*;

/// Wake cause and deep sleep through the IDF sleep API.
pub struct EspPower;

impl PowerControl for EspPower {
    fn wake_cause(&self) -> WakeCause {
        let cause = unsafe { esp_idf_sys::esp_sleep_get_wakeup_cause() };
        match cause {
            esp_idf_sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeCause::Timer,
            // not woken from deep sleep: power-on or reset
            esp_idf_sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => WakeCause::PowerOn,
            other => {
                debug!("Wakeup cause {}", other);
                WakeCause::Other
            }
        }
    }

    fn deep_sleep(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        // the timer wake is armed by esp_deep_sleep itself
        unsafe { esp_idf_sys::esp_deep_sleep(micros) }
    }
}

/// Time since boot and FreeRTOS delays.
pub struct EspClock;

impl Clock for EspClock {
    fn now(&self) -> Duration {
        // microseconds on the high-resolution timer, which starts at boot
        let micros = unsafe { esp_idf_sys::esp_timer_get_time() };
        Duration::from_micros(u64::try_from(micros).unwrap_or(0))
    }

    fn delay(&mut self, duration: Duration) {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        FreeRtos::delay_ms(millis);
    }
}
