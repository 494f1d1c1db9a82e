//! Hardware-independent core of the e-paper information node.
//!
//! The node wakes from deep sleep, listens briefly for a `key=value` payload,
//! redraws the panel when the content changed and goes back to sleep. Content
//! and counters survive sleep in a [`store::RetainedRegion`] placed in RTC
//! memory by the firmware. Everything the core needs from the board comes in
//! through the traits in [`hal`].

pub mod change;
pub mod config;
pub mod content;
pub mod hal;
pub mod parser;
pub mod power;
pub mod render;
pub mod retry;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod mock;

pub use config::NodeConfig;
pub use content::{DisplayItem, DisplayItemSet, RawMessageBuffer};
pub use parser::ContentParser;
pub use render::RenderPipeline;
pub use scheduler::{Devices, DutyCycleScheduler, EpisodeReport};
pub use store::{PersistentStore, RetainedRegion};
