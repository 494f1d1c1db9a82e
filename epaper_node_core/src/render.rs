//! Full-frame layout of the display items and the battery bar.
//!
//! ```text
//! +----------------------------------+
//! |#### Name: Shop ##################|  headline, inverted
//! | Temp:           60               |
//! | Color:          Red              |  body rows, value at midpoint
//! |                                  |
//! | [##########          ]           |  battery bar
//! +----------------------------------+
//! ```

use core::fmt::Write as _;

use anyhow::Context;
use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use log::*;

use crate::config::{BatteryConfig, LayoutConfig};
use crate::content::{DisplayItem, DisplayItemSet, KEY_CAPACITY, VALUE_CAPACITY};
use crate::hal::{DisplayDriver, Font, Ink};
use crate::power::PowerState;

/// Gap between the bar outline and its fill.
const BAR_INSET: u32 = 2;

/// Draws one complete frame per call. Holds no state between renders.
#[derive(Debug, Clone, Copy)]
pub struct RenderPipeline {
    layout: LayoutConfig,
    battery: BatteryConfig,
}

impl RenderPipeline {
    pub fn new(layout: LayoutConfig, battery: BatteryConfig) -> Self {
        Self { layout, battery }
    }

    /// Repaints the whole panel and blocks until the refresh is done.
    pub fn render<D: DisplayDriver>(
        &self,
        display: &mut D,
        items: &DisplayItemSet,
        power: &PowerState,
    ) -> anyhow::Result<()> {
        display.init().context("Display init failed")?;
        display.begin_frame().context("Display frame start failed")?;

        let size = display.size();
        if let Some(headline) = items.headline() {
            self.draw_headline(display, size, headline)?;
        }
        self.draw_rows(display, size, items.rows())?;
        self.draw_battery(display, size, power)?;

        display.end_frame().context("Display refresh failed")?;
        info!(
            "Rendered {} items, battery {}%",
            items.len(),
            power.percent(&self.battery)
        );
        Ok(())
    }

    fn draw_headline<D: DisplayDriver>(
        &self,
        display: &mut D,
        size: Size,
        item: &DisplayItem,
    ) -> anyhow::Result<()> {
        let band = Rectangle::new(
            Point::zero(),
            Size::new(size.width, self.layout.headline_height),
        );
        display.fill_rect(band, Ink::Black)?;

        let line = headline_text(item);

        let margin = self.layout.margin as i32;
        display.text(Point::new(margin, margin / 2), &line, Font::Headline, Ink::White)?;
        Ok(())
    }

    fn draw_rows<D: DisplayDriver>(
        &self,
        display: &mut D,
        size: Size,
        rows: &[DisplayItem],
    ) -> anyhow::Result<()> {
        let layout = &self.layout;
        let value_x = (size.width / 2) as i32;

        for (index, item) in rows.iter().enumerate() {
            let top = layout.headline_height + layout.margin + index as u32 * layout.row_height;
            if top + layout.row_height > self.bar_top(size) {
                debug!("Row {} ({:?}) overlaps the battery bar, not drawn", index + 1, item.key());
                continue;
            }

            let top = top as i32;
            display.text(
                Point::new(layout.margin as i32, top),
                item.key(),
                Font::Body,
                Ink::Black,
            )?;
            display.text(Point::new(value_x, top), item.value(), Font::Body, Ink::Black)?;
        }
        Ok(())
    }

    fn draw_battery<D: DisplayDriver>(
        &self,
        display: &mut D,
        size: Size,
        power: &PowerState,
    ) -> anyhow::Result<()> {
        let layout = &self.layout;
        let outline = Rectangle::new(
            Point::new(layout.margin as i32, self.bar_top(size) as i32),
            Size::new(
                size.width.saturating_sub(2 * layout.margin),
                layout.battery_bar_height,
            ),
        );
        display.outline_rect(outline, Ink::Black)?;

        let inner_width = outline.size.width.saturating_sub(2 * BAR_INSET);
        let fill_width = (inner_width as f32 * power.fill_fraction(&self.battery)) as u32;
        if fill_width > 0 {
            let fill = Rectangle::new(
                outline.top_left + Point::new(BAR_INSET as i32, BAR_INSET as i32),
                Size::new(fill_width, outline.size.height.saturating_sub(2 * BAR_INSET)),
            );
            display.fill_rect(fill, Ink::Black)?;
        }
        Ok(())
    }

    fn bar_top(&self, size: Size) -> u32 {
        size.height.saturating_sub(self.layout.margin + self.layout.battery_bar_height)
    }
}

/// `key value`, or just the value when the key is empty.
fn headline_text(item: &DisplayItem) -> heapless::String<{ KEY_CAPACITY + 1 + VALUE_CAPACITY }> {
    let mut line = heapless::String::new();
    // capacity covers both fields and the space
    let _ = if item.key().is_empty() {
        write!(line, "{}", item.value())
    } else {
        write!(line, "{} {}", item.key(), item.value())
    };
    line
}
