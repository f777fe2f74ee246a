//! Calibration display on an addressable LED bar.
//!
//! One LED per line sensor. Bar graphs set each LED's brightness from its
//! level; the heading is shown as a single lit LED sweeping from the right
//! end (-90°) to the left end (+90°). Text messages have no LED form and go
//! to the log instead.

use smart_leds_trait::{SmartLedsWrite, RGB8};

use crate::utils::{controllers::driver::Display, sensors::line::SENSOR_COUNT};

/// Number of LEDs in the bar.
pub const LED_COUNT: usize = SENSOR_COUNT;

/// Highest bar level.
const FULL_LEVEL: u8 = 8;

pub struct LedBar<Driver> {
    driver: Driver,
    color: RGB8,
}

impl<Driver, E> LedBar<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
{
    /// Create a bar drawing in green.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            color: RGB8 { r: 0, g: 255, b: 0 },
        }
    }

    pub fn with_color(
        mut self,
        color: RGB8,
    ) -> Self {
        self.color = color;
        self
    }

    /// Write one brightness level per LED.
    fn write_levels(
        &mut self,
        levels: &[u8; LED_COUNT],
    ) -> Result<(), E> {
        let color = self.color;
        let data = levels.iter().map(move |&level| {
            let level = u16::from(level.min(FULL_LEVEL));
            let dim = |c: u8| (u16::from(c) * level / u16::from(FULL_LEVEL)) as u8;
            RGB8 {
                r: dim(color.r),
                g: dim(color.g),
                b: dim(color.b),
            }
        });
        self.driver.write(data)
    }
}

/// LED lit for `degrees`, clamped to ±90°. LED 0 is the leftmost.
fn heading_led(degrees: i32) -> usize {
    let clamped = degrees.clamp(-90, 90);
    ((90 - clamped) * (LED_COUNT as i32 - 1) / 180) as usize
}

impl<Driver, E> Display for LedBar<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
    E: core::fmt::Debug,
{
    type Error = E;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.write_levels(&[0; LED_COUNT])
    }

    fn show_message(
        &mut self,
        message: &str,
    ) -> Result<(), Self::Error> {
        tracing::info!(message, "display");
        Ok(())
    }

    fn show_heading(
        &mut self,
        degrees: i32,
    ) -> Result<(), Self::Error> {
        let mut levels = [0; LED_COUNT];
        levels[heading_led(degrees)] = FULL_LEVEL;
        self.write_levels(&levels)
    }

    fn show_bars(
        &mut self,
        levels: &[u8; SENSOR_COUNT],
    ) -> Result<(), Self::Error> {
        self.write_levels(levels)
    }
}
