use core::time::Duration;

use log::*;

use crate::hal::Clock;

/// Runs `attempt` until it succeeds, waiting `backoff` on `clock` after each
/// failure. Never gives up.
pub fn retry_forever<C, T, F>(clock: &mut C, backoff: Duration, what: &str, mut attempt: F) -> T
where
    C: Clock,
    F: FnMut() -> anyhow::Result<T>,
{
    let mut failures: u32 = 0;
    loop {
        match attempt() {
            Ok(value) => {
                if failures > 0 {
                    info!("{} succeeded after {} retries", what, failures);
                }
                return value;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(
                    "{} failed (attempt {}): {:#}, retrying in {} ms",
                    what,
                    failures,
                    e,
                    backoff.as_millis()
                );
                clock.delay(backoff);
            }
        }
    }
}
