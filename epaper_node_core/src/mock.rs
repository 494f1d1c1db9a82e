//! Host-side stand-ins for the hardware collaborators.

use std::collections::VecDeque;

use core::time::Duration;

use anyhow::anyhow;
use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;

use crate::hal::{
    Clock, DisplayDriver, Font, Ink, MessageChannel, Network, PowerControl, PowerSensor, WakeCause,
};

/// Clock that only advances when someone waits on it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
    delays: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn delay(&mut self, duration: Duration) {
        self.now += duration;
        self.delays.push(duration);
    }
}

/// Network that fails a fixed number of times before connecting.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    failures_left: u32,
    pub connect_attempts: u32,
    pub disconnects: u32,
    pub connected: bool,
}

impl ScriptedNetwork {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: times,
            ..Self::default()
        }
    }
}

impl Network for ScriptedNetwork {
    fn connect(&mut self) -> anyhow::Result<()> {
        self.connect_attempts += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(anyhow!("no access point"));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        self.disconnects += 1;
        self.connected = false;
        Ok(())
    }
}

/// Channel that hands out one scripted poll result per call.
///
/// Once the script runs out every poll returns `None`.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: VecDeque<anyhow::Result<Option<Vec<u8>>>>,
    failures_left: u32,
    pub connect_attempts: u32,
    pub polls: u32,
    pub disconnects: u32,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `payload` after everything scripted so far.
    pub fn deliver(mut self, payload: &[u8]) -> Self {
        self.script.push_back(Ok(Some(payload.to_vec())));
        self
    }

    /// Queues `polls` empty results after everything scripted so far.
    pub fn silence(mut self, polls: usize) -> Self {
        for _ in 0..polls {
            self.script.push_back(Ok(None));
        }
        self
    }

    pub fn poll_error(mut self) -> Self {
        self.script.push_back(Err(anyhow!("broker went away")));
        self
    }

    pub fn failing_connects(mut self, times: u32) -> Self {
        self.failures_left = times;
        self
    }
}

impl MessageChannel for ScriptedChannel {
    fn connect(&mut self) -> anyhow::Result<()> {
        self.connect_attempts += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }

    fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        self.polls += 1;
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        self.disconnects += 1;
        Ok(())
    }
}

/// One drawing primitive as seen by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill { area: Rectangle, ink: Ink },
    Outline { area: Rectangle, ink: Ink },
    Text { at: Point, text: String, font: Font, ink: Ink },
}

/// Display that records completed frames instead of driving a panel.
#[derive(Debug)]
pub struct RecordingDisplay {
    size: Size,
    inits: u32,
    pending: Option<Vec<DrawOp>>,
    frames: Vec<Vec<DrawOp>>,
    fail_refresh: bool,
}

impl RecordingDisplay {
    /// A 2.9" panel in landscape.
    pub fn new() -> Self {
        Self {
            size: Size::new(296, 128),
            inits: 0,
            pending: None,
            frames: Vec::new(),
            fail_refresh: false,
        }
    }

    pub fn fail_refresh(&mut self, fail: bool) {
        self.fail_refresh = fail;
    }

    pub fn frames(&self) -> &[Vec<DrawOp>] {
        &self.frames
    }

    pub fn inits(&self) -> u32 {
        self.inits
    }

    fn record(&mut self, op: DrawOp) -> anyhow::Result<()> {
        self.pending
            .as_mut()
            .ok_or_else(|| anyhow!("draw outside of a frame"))?
            .push(op);
        Ok(())
    }
}

impl DisplayDriver for RecordingDisplay {
    fn init(&mut self) -> anyhow::Result<()> {
        self.inits += 1;
        Ok(())
    }

    fn size(&self) -> Size {
        self.size
    }

    fn begin_frame(&mut self) -> anyhow::Result<()> {
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn fill_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()> {
        self.record(DrawOp::Fill { area, ink })
    }

    fn outline_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()> {
        self.record(DrawOp::Outline { area, ink })
    }

    fn text(&mut self, at: Point, text: &str, font: Font, ink: Ink) -> anyhow::Result<()> {
        self.record(DrawOp::Text {
            at,
            text: text.to_string(),
            font,
            ink,
        })
    }

    fn end_frame(&mut self) -> anyhow::Result<()> {
        let frame = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("no frame in progress"))?;
        if self.fail_refresh {
            return Err(anyhow!("panel busy timeout"));
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Sensor returning a fixed reading or always failing.
#[derive(Debug)]
pub struct FixedSensor(Option<u32>);

impl FixedSensor {
    pub fn ok(millivolts: u32) -> Self {
        Self(Some(millivolts))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

impl PowerSensor for FixedSensor {
    fn read_millivolts(&mut self) -> anyhow::Result<u32> {
        self.0.ok_or_else(|| anyhow!("ADC read timed out"))
    }
}

/// Power control that records sleep requests and returns.
#[derive(Debug)]
pub struct RecordingPower {
    pub cause: WakeCause,
    pub sleeps: Vec<Duration>,
}

impl RecordingPower {
    pub fn new(cause: WakeCause) -> Self {
        Self {
            cause,
            sleeps: Vec::new(),
        }
    }
}

impl PowerControl for RecordingPower {
    fn wake_cause(&self) -> WakeCause {
        self.cause
    }

    fn deep_sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}
