//! Interfaces to the hardware collaborators.
//!
//! The scheduler only talks to the outside world through these traits. The
//! firmware crate implements them on top of ESP-IDF. All operations are
//! synchronous and may block.

use core::time::Duration;

use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;

/// Why the chip started executing this episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Cold boot or reset.
    PowerOn,
    /// The deep-sleep timer expired.
    Timer,
    /// Any other wake source (GPIO, touch, ULP).
    Other,
}

impl WakeCause {
    pub fn is_timer(self) -> bool {
        matches!(self, WakeCause::Timer)
    }
}

/// Network connectivity (Wi-Fi station).
pub trait Network {
    /// Brings the link up. Called repeatedly until it succeeds.
    fn connect(&mut self) -> anyhow::Result<()>;

    /// Tears the link down before deep sleep.
    fn disconnect(&mut self) -> anyhow::Result<()>;
}

/// Subscription to the content topic.
pub trait MessageChannel {
    /// Connects to the broker and subscribes. Called repeatedly until it succeeds.
    fn connect(&mut self) -> anyhow::Result<()>;

    /// Next payload received since the previous call, if any. Never blocks.
    fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>>;

    fn disconnect(&mut self) -> anyhow::Result<()>;
}

/// Two-tone ink of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Black,
    White,
}

/// Font roles; the driver maps them to concrete faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    /// Emphasized face for the headline row.
    Headline,
    /// Lighter face for body rows.
    Body,
}

/// Frame-based drawing on the panel.
///
/// The core never touches pixels: a frame is a sequence of primitive
/// operations between `begin_frame` and `end_frame`.
pub trait DisplayDriver {
    /// Powers up (or wakes) the panel controller.
    fn init(&mut self) -> anyhow::Result<()>;

    /// Drawable area in pixels, after rotation.
    fn size(&self) -> Size;

    /// Starts a new frame with every pixel cleared to white.
    fn begin_frame(&mut self) -> anyhow::Result<()>;

    fn fill_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()>;

    fn outline_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()>;

    /// Draws `text` with its top-left corner at `cursor`.
    fn text(&mut self, cursor: Point, text: &str, font: Font, ink: Ink) -> anyhow::Result<()>;

    /// Pushes the frame to the panel and blocks until the refresh completes.
    fn end_frame(&mut self) -> anyhow::Result<()>;
}

/// Battery voltage behind the divider.
pub trait PowerSensor {
    fn read_millivolts(&mut self) -> anyhow::Result<u32>;
}

/// Wake cause and deep-sleep entry.
pub trait PowerControl {
    fn wake_cause(&self) -> WakeCause;

    /// Arms the wake timer and enters deep sleep. Does not return on hardware.
    fn deep_sleep(&mut self, duration: Duration);
}

/// Monotonic time and blocking delays.
pub trait Clock {
    /// Time elapsed since boot.
    fn now(&self) -> Duration;

    fn delay(&mut self, duration: Duration);
}
