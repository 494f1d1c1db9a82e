// ===============================================================================
// E-PAPER PANEL
// ===============================================================================
// Waveshare 2.9" v2 (296x128, black/white) over SPI, drawn in landscape.
// The controller is initialized on the first render of a boot, woken on later
// ones, and put into deep sleep after every refresh.
// ===============================================================================

use anyhow::anyhow;
use embedded_graphics::{
    mono_font::MonoTextStyle,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use embedded_hal::digital::{InputPin as InputPinTrait, OutputPin as OutputPinTrait};
use embedded_hal::spi::SpiDevice;
use epaper_node_core::hal::{DisplayDriver, Font, Ink};
use epd_waveshare::{
    epd2in9_v2::{Display2in9, Epd2in9},
    prelude::*,
};
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver},
    prelude::*,
    spi::{config::Config, SpiDeviceDriver, SpiDriver, SpiDriverConfig, SPI2},
};
use log::*;
use profont::{PROFONT_12_POINT, PROFONT_18_POINT};

/// Bus error reported to the panel driver.
#[derive(Debug)]
pub struct PanelBusError;

impl embedded_hal::spi::Error for PanelBusError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_hal::digital::Error for PanelBusError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// ESP-IDF SPI device as an embedded-hal `SpiDevice`.
pub struct PanelSpi<'a> {
    spi: SpiDeviceDriver<'a, SpiDriver<'a>>,
}

impl embedded_hal::spi::ErrorType for PanelSpi<'_> {
    type Error = PanelBusError;
}

impl SpiDevice for PanelSpi<'_> {
    fn transaction(
        &mut self,
        operations: &mut [embedded_hal::spi::Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                embedded_hal::spi::Operation::Write(data) => {
                    if !data.is_empty() {
                        self.spi.write(data).map_err(|_| PanelBusError)?;
                    }
                }
                embedded_hal::spi::Operation::Transfer(read, write) => {
                    if !write.is_empty() {
                        self.spi.transfer(read, write).map_err(|_| PanelBusError)?;
                    }
                }
                embedded_hal::spi::Operation::TransferInPlace(data) => {
                    if !data.is_empty() {
                        let temp = data.to_vec();
                        self.spi.transfer(data, &temp).map_err(|_| PanelBusError)?;
                    }
                }
                embedded_hal::spi::Operation::DelayNs(ns) => {
                    FreeRtos::delay_ms(ns.div_ceil(1_000_000));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Data/command and reset lines.
pub struct PanelPin<'a> {
    pin: PinDriver<'a, AnyOutputPin, Output>,
}

impl embedded_hal::digital::ErrorType for PanelPin<'_> {
    type Error = PanelBusError;
}

impl OutputPinTrait for PanelPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low().map_err(|_| PanelBusError)
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high().map_err(|_| PanelBusError)
    }
}

/// BUSY line, high while the controller is refreshing.
pub struct PanelBusy<'a> {
    pin: PinDriver<'a, AnyInputPin, Input>,
}

impl embedded_hal::digital::ErrorType for PanelBusy<'_> {
    type Error = PanelBusError;
}

impl InputPinTrait for PanelBusy<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

type Panel = Epd2in9<
    PanelSpi<'static>,
    PanelBusy<'static>,
    PanelPin<'static>,
    PanelPin<'static>,
    FreeRtos,
>;

/// Control lines, held until the controller is first initialized.
struct PanelLines {
    busy: PanelBusy<'static>,
    dc: PanelPin<'static>,
    rst: PanelPin<'static>,
}

/// Frame buffer plus the lazily initialized panel controller.
pub struct EpaperDisplay {
    spi: PanelSpi<'static>,
    lines: Option<PanelLines>,
    panel: Option<Panel>,
    awake: bool,
    frame: Display2in9,
    delay: FreeRtos,
}

impl EpaperDisplay {
    /// Sets up the SPI bus and control lines. The panel itself is not touched yet.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spi: SPI2,
        sclk: AnyOutputPin,
        mosi: AnyOutputPin,
        cs: AnyOutputPin,
        busy: AnyInputPin,
        dc: AnyOutputPin,
        rst: AnyOutputPin,
    ) -> anyhow::Result<Self> {
        info!("Initializing e-paper SPI bus...");

        let spi_config = Config::new().baudrate(4.MHz().into());
        let spi_driver = SpiDriver::new(
            spi,
            sclk,
            mosi,
            None::<AnyIOPin>,
            &SpiDriverConfig::new(),
        )?;
        let spi_device = SpiDeviceDriver::new(spi_driver, Some(cs), &spi_config)?;

        let lines = PanelLines {
            busy: PanelBusy {
                pin: PinDriver::input(busy)?,
            },
            dc: PanelPin {
                pin: PinDriver::output(dc)?,
            },
            rst: PanelPin {
                pin: PinDriver::output(rst)?,
            },
        };

        let mut frame = Display2in9::default();
        frame.set_rotation(DisplayRotation::Rotate90);

        Ok(Self {
            spi: PanelSpi { spi: spi_device },
            lines: Some(lines),
            panel: None,
            awake: false,
            frame,
            delay: FreeRtos,
        })
    }

    fn color(ink: Ink) -> Color {
        match ink {
            Ink::Black => Color::Black,
            Ink::White => Color::White,
        }
    }
}

impl DisplayDriver for EpaperDisplay {
    fn init(&mut self) -> anyhow::Result<()> {
        match self.panel.as_mut() {
            Some(panel) => {
                if !self.awake {
                    panel
                        .wake_up(&mut self.spi, &mut self.delay)
                        .map_err(|e| anyhow!("E-paper wake up failed: {:?}", e))?;
                }
            }
            None => {
                let lines = self
                    .lines
                    .take()
                    .ok_or_else(|| anyhow!("E-paper control lines lost after a failed init"))?;
                let panel = Epd2in9::new(
                    &mut self.spi,
                    lines.busy,
                    lines.dc,
                    lines.rst,
                    &mut self.delay,
                    None,
                )
                .map_err(|e| anyhow!("E-paper initialization failed: {:?}", e))?;
                self.panel = Some(panel);
                info!("E-paper initialized");
            }
        }
        self.awake = true;
        Ok(())
    }

    fn size(&self) -> Size {
        self.frame.bounding_box().size
    }

    fn begin_frame(&mut self) -> anyhow::Result<()> {
        self.frame
            .clear(Color::White)
            .map_err(|e| anyhow!("Frame clear failed: {:?}", e))
    }

    fn fill_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()> {
        area.into_styled(PrimitiveStyle::with_fill(Self::color(ink)))
            .draw(&mut self.frame)
            .map_err(|e| anyhow!("Fill failed: {:?}", e))
    }

    fn outline_rect(&mut self, area: Rectangle, ink: Ink) -> anyhow::Result<()> {
        area.into_styled(PrimitiveStyle::with_stroke(Self::color(ink), 1))
            .draw(&mut self.frame)
            .map_err(|e| anyhow!("Outline failed: {:?}", e))
    }

    fn text(&mut self, cursor: Point, text: &str, font: Font, ink: Ink) -> anyhow::Result<()> {
        let face = match font {
            Font::Headline => &PROFONT_18_POINT,
            Font::Body => &PROFONT_12_POINT,
        };
        let style = MonoTextStyle::new(face, Self::color(ink));
        Text::with_baseline(text, cursor, style, Baseline::Top)
            .draw(&mut self.frame)
            .map_err(|e| anyhow!("Text failed: {:?}", e))?;
        Ok(())
    }

    fn end_frame(&mut self) -> anyhow::Result<()> {
        let panel = self
            .panel
            .as_mut()
            .ok_or_else(|| anyhow!("E-paper not initialized"))?;

        // blocks on BUSY until the refresh is done
        panel
            .update_and_display_frame(&mut self.spi, self.frame.buffer(), &mut self.delay)
            .map_err(|e| anyhow!("E-paper refresh failed: {:?}", e))?;

        panel
            .sleep(&mut self.spi, &mut self.delay)
            .map_err(|e| anyhow!("E-paper sleep failed: {:?}", e))?;
        self.awake = false;
        debug!("E-paper refreshed and asleep");
        Ok(())
    }
}
