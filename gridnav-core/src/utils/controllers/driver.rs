//! Hardware seams used by the navigation core.
//!
//! The core never touches pins or buses directly. Boards (or the simulator)
//! implement these traits and hand them over in a [`Hardware`] bundle.

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::utils::{
    math::heading::HeadingTracker,
    sensors::line::{LineSensorFrontEnd, SensorFrame, SENSOR_COUNT},
};

/// Left/right wheel speed drive.
pub trait DriveMotors {
    type Error: core::fmt::Debug;

    /// Command independently signed wheel speeds. Positive drives forward.
    fn set_speeds(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error>;
}

/// Yaw-rate gyroscope.
pub trait Gyro {
    type Error: core::fmt::Debug;

    /// Read one fresh yaw-rate sample in raw sensor units. Positive is counter-clockwise.
    fn read_angular_rate(&mut self) -> Result<i16, Self::Error>;

    /// Whether a new sample is waiting. Sensors without a status flag are always ready.
    fn sample_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Reflectance sensor array, ordered left to right. Darker surfaces read higher.
pub trait LineSensorArray {
    type Error: core::fmt::Debug;

    fn read_raw(&mut self) -> Result<[u16; SENSOR_COUNT], Self::Error>;
}

/// Free-running microsecond counter that wraps at 2^16.
pub trait MicrosClock {
    fn now_micros(&mut self) -> u16;
}

/// Operator display, used only while calibrating.
pub trait Display {
    type Error: core::fmt::Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;

    fn show_message(
        &mut self,
        message: &str,
    ) -> Result<(), Self::Error>;

    /// Show the current heading in whole degrees.
    fn show_heading(
        &mut self,
        degrees: i32,
    ) -> Result<(), Self::Error>;

    /// Show one bar per sensor, each 0..=8.
    fn show_bars(
        &mut self,
        levels: &[u8; SENSOR_COUNT],
    ) -> Result<(), Self::Error>;
}

/// Debounced confirm button.
pub trait ConfirmButton {
    /// True once per press.
    fn single_debounced_press(&mut self) -> bool;
    /// True once per release.
    fn single_debounced_release(&mut self) -> bool;
}

/// [`MicrosClock`] backed by the embassy time driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyClock;

impl MicrosClock for EmbassyClock {
    fn now_micros(&mut self) -> u16 {
        embassy_time::Instant::now().as_micros() as u16
    }
}

/// Errors surfaced by the navigation core.
///
/// Collaborator errors are logged where they occur and collapsed to the
/// collaborator that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavError {
    Motors,
    Gyro,
    LineSensors,
    Display,
    /// A motion command arrived before the robot was calibrated.
    NotCalibrated,
}

impl NavError {
    pub(crate) fn motors<E: core::fmt::Debug>(error: E) -> Self {
        tracing::error!(?error, "drive failed");
        NavError::Motors
    }

    pub(crate) fn gyro<E: core::fmt::Debug>(error: E) -> Self {
        tracing::error!(?error, "gyro read failed");
        NavError::Gyro
    }

    pub(crate) fn line_sensors<E: core::fmt::Debug>(error: E) -> Self {
        tracing::error!(?error, "line sensor read failed");
        NavError::LineSensors
    }

    pub(crate) fn display<E: core::fmt::Debug>(error: E) -> Self {
        tracing::warn!(?error, "display write failed");
        NavError::Display
    }
}

impl core::fmt::Display for NavError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            NavError::Motors => f.write_str("motor driver error"),
            NavError::Gyro => f.write_str("gyro error"),
            NavError::LineSensors => f.write_str("line sensor error"),
            NavError::Display => f.write_str("display error"),
            NavError::NotCalibrated => f.write_str("robot is not calibrated"),
        }
    }
}

/// A pair of signed wheel speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: i16,
    pub right: i16,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    pub const fn new(
        left: i16,
        right: i16,
    ) -> Self {
        Self { left, right }
    }

    /// Both wheels forward at `speed`.
    pub const fn straight(speed: i16) -> Self {
        Self::new(speed, speed)
    }

    /// Limit both wheels to `-max..=max`.
    pub fn clamped(
        self,
        max: i16,
    ) -> Self {
        let max = max.saturating_abs();
        Self {
            left: self.left.clamp(-max, max),
            right: self.right.clamp(-max, max),
        }
    }
}

/// Everything the core drives or samples, owned in one place.
///
/// `max_speed` is enforced on every command passing through [`Hardware::drive`].
pub struct Hardware<M, G, S, C, D> {
    pub motors: M,
    pub gyro: G,
    pub sensors: S,
    pub clock: C,
    pub delay: D,
    pub max_speed: i16,
}

impl<M, G, S, C, D> Hardware<M, G, S, C, D> {
    pub fn new(
        motors: M,
        gyro: G,
        sensors: S,
        clock: C,
        delay: D,
    ) -> Self {
        Hardware {
            motors,
            gyro,
            sensors,
            clock,
            delay,
            max_speed: i16::MAX,
        }
    }

    /// Send a clamped command to the drive.
    pub fn drive(
        &mut self,
        command: MotorCommand,
    ) -> Result<(), NavError>
    where
        M: DriveMotors,
    {
        let command = command.clamped(self.max_speed);
        self.motors
            .set_speeds(command.left, command.right)
            .map_err(NavError::motors)
    }

    /// Start heading integration from the current instant.
    pub fn reset_heading(
        &mut self,
        heading: &mut HeadingTracker,
    ) where
        C: MicrosClock,
    {
        heading.reset(self.clock.now_micros());
    }

    /// Read the clock and one gyro sample, then integrate.
    pub fn update_heading(
        &mut self,
        heading: &mut HeadingTracker,
    ) -> Result<(), NavError>
    where
        G: Gyro,
        C: MicrosClock,
    {
        let now = self.clock.now_micros();
        let rate = self.gyro.read_angular_rate().map_err(NavError::gyro)?;
        heading.update(rate, now);
        Ok(())
    }

    /// Take a calibrated frame from the sensor array.
    pub fn read_frame(
        &mut self,
        line: &mut LineSensorFrontEnd,
    ) -> Result<SensorFrame, NavError>
    where
        S: LineSensorArray,
    {
        line.read_frame(&mut self.sensors)
    }

    /// Busy-wait for `ms` milliseconds.
    pub fn pause_ms(
        &mut self,
        ms: u32,
    ) where
        D: DelayNs,
    {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_limits_both_directions() {
        let cmd = MotorCommand::new(500, -500).clamped(400);
        assert_eq!(cmd, MotorCommand::new(400, -400));
    }

    #[test]
    fn embassy_clock_counts_microseconds() {
        let mut clock = EmbassyClock;
        let start = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_micros().wrapping_sub(start) >= 2000);
    }

    #[test]
    fn clamped_handles_negative_max() {
        let cmd = MotorCommand::new(50, -50).clamped(-20);
        assert_eq!(cmd, MotorCommand::new(20, -20));
    }
}
