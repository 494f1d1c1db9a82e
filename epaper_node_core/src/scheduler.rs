//! Wake episode state machine.
//!
//! Each boot runs exactly one episode and ends in deep sleep:
//!
//! ```text
//!            wake
//!             |
//!   cold boot or counter > threshold ?
//!        yes /          \ no
//!  ForcedRedraw        Listen ---- new payload -> store, parse, render
//!   render stored        |
//!   reset counter        | window elapsed or new content
//!        \               /
//!         `---> Sleep <-'
//!  (WAKEUP_TIME)   (SLEEP_SECONDS)
//! ```

use core::time::Duration;

use log::*;

use crate::change::detect_change;
use crate::config::NodeConfig;
use crate::hal::{
    Clock, DisplayDriver, MessageChannel, Network, PowerControl, PowerSensor, WakeCause,
};
use crate::parser::ContentParser;
use crate::power::PowerState;
use crate::render::RenderPipeline;
use crate::retry::retry_forever;
use crate::store::PersistentStore;

/// The hardware one episode drives.
pub struct Devices<N, M, D, S, P, C> {
    pub network: N,
    pub channel: M,
    pub display: D,
    pub sensor: S,
    pub power: P,
    pub clock: C,
}

/// Why an episode redraws without waiting for new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    /// The wake was not a timer wake.
    ColdBoot,
    /// Too many ordinary wakes since the last redraw.
    StaleDisplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ForcedRedraw(RedrawReason),
    Listen,
    /// Terminal: deep sleep for the given duration.
    Sleep(Duration),
}

impl State {
    /// First state of an episode.
    pub fn on_wake(cause: WakeCause, wake_counter: u32, threshold: u32) -> Self {
        if !cause.is_timer() {
            State::ForcedRedraw(RedrawReason::ColdBoot)
        } else if wake_counter > threshold {
            State::ForcedRedraw(RedrawReason::StaleDisplay)
        } else {
            State::Listen
        }
    }
}

/// What one episode did. On hardware only the log line survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeReport {
    pub cause: WakeCause,
    /// `ForcedRedraw` or `Listen`; never `Sleep`.
    pub path: State,
    pub new_content: bool,
    /// Payloads dropped because they matched the stored message.
    pub duplicates: u32,
    /// Render pipeline invocations, failed ones included.
    pub renders: u32,
    /// Counter value persisted for the next wake.
    pub wake_counter: u32,
    pub sleep_for: Duration,
}

impl EpisodeReport {
    fn new(cause: WakeCause, path: State) -> Self {
        Self {
            cause,
            path,
            new_content: false,
            duplicates: 0,
            renders: 0,
            wake_counter: 0,
            sleep_for: Duration::ZERO,
        }
    }
}

pub struct DutyCycleScheduler<'r, N, M, D, S, P, C> {
    config: NodeConfig,
    store: PersistentStore<'r>,
    devices: Devices<N, M, D, S, P, C>,
    parser: ContentParser,
    renderer: RenderPipeline,
}

impl<'r, N, M, D, S, P, C> DutyCycleScheduler<'r, N, M, D, S, P, C>
where
    N: Network,
    M: MessageChannel,
    D: DisplayDriver,
    S: PowerSensor,
    P: PowerControl,
    C: Clock,
{
    pub fn new(
        config: NodeConfig,
        store: PersistentStore<'r>,
        devices: Devices<N, M, D, S, P, C>,
    ) -> Self {
        Self {
            parser: config.parser(),
            renderer: RenderPipeline::new(config.layout, config.battery),
            config,
            store,
            devices,
        }
    }

    /// Runs one wake episode through to deep sleep.
    ///
    /// On hardware `deep_sleep` does not return, so neither does this.
    pub fn run_episode(&mut self) -> EpisodeReport {
        let cause = self.devices.power.wake_cause();
        let mut state = State::on_wake(
            cause,
            self.store.wake_counter(),
            self.config.timing.redraw_wake_threshold,
        );
        info!(
            "Wake cause {:?}, wake counter {}: {:?}",
            cause,
            self.store.wake_counter(),
            state
        );

        let mut report = EpisodeReport::new(cause, state);
        loop {
            state = match state {
                State::ForcedRedraw(reason) => self.forced_redraw(reason, &mut report),
                State::Listen => self.listen(&mut report),
                State::Sleep(duration) => {
                    report.wake_counter = self.store.wake_counter();
                    report.sleep_for = duration;
                    info!("Episode finished: {:?}", report);
                    self.sleep(duration);
                    return report;
                }
            };
        }
    }

    fn forced_redraw(&mut self, reason: RedrawReason, report: &mut EpisodeReport) -> State {
        info!("Forced redraw ({:?}) of {} stored items", reason, self.store.items().len());
        self.render(report);
        self.store.reset_wake_counter();
        State::Sleep(self.config.timing.wakeup_time())
    }

    fn listen(&mut self, report: &mut EpisodeReport) -> State {
        let counter = self.store.increment_wake_counter();
        debug!("Ordinary wake #{}", counter);

        let backoff = self.config.timing.connect_retry();
        {
            let Devices {
                network,
                channel,
                clock,
                ..
            } = &mut self.devices;
            retry_forever(clock, backoff, "Network connect", || network.connect());
            info!("Network connected");
            retry_forever(clock, backoff, "Broker connect", || channel.connect());
            info!("Message channel connected");
        }

        let window = self.config.timing.wakeup_time();
        let poll_interval = self.config.timing.poll_interval();
        let deadline = self.devices.clock.now() + window;
        loop {
            match self.devices.channel.poll() {
                Ok(Some(payload)) => {
                    if self.handle_payload(&payload, report) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Message poll failed: {:#}", e),
            }

            if self.devices.clock.now() >= deadline {
                info!("No new content within {} s", window.as_secs());
                break;
            }
            self.devices.clock.delay(poll_interval);
        }

        self.shutdown();
        State::Sleep(self.config.timing.sleep_duration())
    }

    /// Stores, parses and renders a payload unless it repeats the stored
    /// message. Returns whether it was new.
    fn handle_payload(&mut self, payload: &[u8], report: &mut EpisodeReport) -> bool {
        let Some(message) = detect_change(self.store.message(), payload) else {
            debug!("Duplicate payload ({} bytes) ignored", payload.len());
            report.duplicates += 1;
            return false;
        };

        let items = self.parser.parse(message.as_bytes());
        info!("New content: {} bytes, {} items", message.len(), items.len());
        self.store.replace_content(message, items);
        report.new_content = true;
        self.render(report);
        true
    }

    fn render(&mut self, report: &mut EpisodeReport) {
        let power = PowerState::sample(&mut self.devices.sensor, &self.config.battery);
        report.renders += 1;
        if let Err(e) = self
            .renderer
            .render(&mut self.devices.display, self.store.items(), &power)
        {
            error!("Render failed: {:#}", e);
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.devices.channel.disconnect() {
            warn!("Message channel disconnect failed: {:#}", e);
        }
        if let Err(e) = self.devices.network.disconnect() {
            warn!("Network disconnect failed: {:#}", e);
        }
    }

    fn sleep(&mut self, duration: Duration) {
        info!("Entering deep sleep for {} s", duration.as_secs());
        self.devices.power.deep_sleep(duration);
    }

    pub fn store(&self) -> &PersistentStore<'r> {
        &self.store
    }

    pub fn devices(&self) -> &Devices<N, M, D, S, P, C> {
        &self.devices
    }

    pub fn into_devices(self) -> Devices<N, M, D, S, P, C> {
        self.devices
    }
}
