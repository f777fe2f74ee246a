//! Startup calibration of the gyro bias and the line-sensor ranges.
//!
//! 1. Settle, then average stationary gyro samples into the bias.
//! 2. Show the live heading until the confirm button is released.
//! 3. Settle again so the robot is not moving while still being touched.
//! 4. Sweep 90° left, 90° right and back to 0° on the gyro, calibrating the
//!    line sensors throughout so each sensor sees both line and background.
//! 5. Show a live bar graph of calibrated readings until confirm is pressed.

use embedded_hal::delay::DelayNs;

use crate::utils::{
    controllers::driver::{
        ConfirmButton, Display, DriveMotors, Gyro, Hardware, LineSensorArray, MicrosClock,
        MotorCommand, NavError,
    },
    math::heading::{HeadingTracker, ANGLE_90},
    motion::wait_until,
    sensors::line::LineSensorFrontEnd,
};

pub struct CalibrationSequencer {
    speed: i16,
    bias_samples: u16,
    gyro_settle_ms: u32,
    line_settle_ms: u32,
}

impl CalibrationSequencer {
    pub fn new(
        speed: i16,
        bias_samples: u16,
        gyro_settle_ms: u32,
        line_settle_ms: u32,
    ) -> Self {
        Self {
            speed,
            bias_samples,
            gyro_settle_ms,
            line_settle_ms,
        }
    }

    /// Run every calibration step in order. Blocks on the operator at steps 2 and 5.
    pub fn run<M, G, S, C, D, P, B>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        line: &mut LineSensorFrontEnd,
        display: &mut P,
        button: &mut B,
    ) -> Result<(), NavError>
    where
        M: DriveMotors,
        G: Gyro,
        S: LineSensorArray,
        C: MicrosClock,
        D: DelayNs,
        P: Display,
        B: ConfirmButton,
    {
        self.calibrate_gyro(hw, heading, display)?;
        self.confirm_heading(hw, heading, display, button)?;

        display.clear().map_err(NavError::display)?;
        display.show_message("Line cal").map_err(NavError::display)?;
        hw.pause_ms(self.line_settle_ms);

        self.sweep(hw, heading, line)?;
        self.confirm_readings(hw, line, display, button)?;

        display.clear().map_err(NavError::display)?;
        tracing::info!(calibration = ?line.calibration(), "line sensors calibrated");
        Ok(())
    }

    fn calibrate_gyro<M, G, S, C, D, P>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        display: &mut P,
    ) -> Result<(), NavError>
    where
        G: Gyro,
        D: DelayNs,
        P: Display,
    {
        display.clear().map_err(NavError::display)?;
        display.show_message("Gyro cal").map_err(NavError::display)?;
        hw.pause_ms(self.gyro_settle_ms);

        heading.calibrate_bias(&mut hw.gyro, self.bias_samples)?;
        Ok(())
    }

    fn confirm_heading<M, G, S, C, D, P, B>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        display: &mut P,
        button: &mut B,
    ) -> Result<(), NavError>
    where
        G: Gyro,
        C: MicrosClock,
        P: Display,
        B: ConfirmButton,
    {
        display.clear().map_err(NavError::display)?;
        hw.reset_heading(heading);
        wait_until(|| {
            if button.single_debounced_release() {
                return Ok(true);
            }
            hw.update_heading(heading)?;
            display
                .show_heading(heading.degrees())
                .map_err(NavError::display)?;
            Ok(false)
        })
    }

    /// Left to +90°, right to -90°, then left back to 0°.
    fn sweep<M, G, S, C, D>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        line: &mut LineSensorFrontEnd,
    ) -> Result<(), NavError>
    where
        M: DriveMotors,
        G: Gyro,
        S: LineSensorArray,
        C: MicrosClock,
    {
        let left = MotorCommand::new(-self.speed, self.speed);
        let right = MotorCommand::new(self.speed, -self.speed);

        hw.reset_heading(heading);
        Self::sweep_until(hw, heading, line, left, |angle| angle >= ANGLE_90)?;
        Self::sweep_until(hw, heading, line, right, |angle| angle <= -ANGLE_90)?;
        Self::sweep_until(hw, heading, line, left, |angle| angle >= 0)?;
        hw.drive(MotorCommand::STOP)
    }

    fn sweep_until<M, G, S, C, D>(
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        line: &mut LineSensorFrontEnd,
        command: MotorCommand,
        done: impl Fn(i64) -> bool,
    ) -> Result<(), NavError>
    where
        M: DriveMotors,
        G: Gyro,
        S: LineSensorArray,
        C: MicrosClock,
    {
        hw.drive(command)?;
        wait_until(|| {
            if done(heading.angle()) {
                return Ok(true);
            }
            line.calibrate(&mut hw.sensors)?;
            hw.update_heading(heading)?;
            Ok(false)
        })?;
        tracing::debug!(degrees = heading.degrees(), "sweep leg done");
        Ok(())
    }

    fn confirm_readings<M, G, S, C, D, P, B>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        line: &mut LineSensorFrontEnd,
        display: &mut P,
        button: &mut B,
    ) -> Result<(), NavError>
    where
        S: LineSensorArray,
        P: Display,
        B: ConfirmButton,
    {
        display.clear().map_err(NavError::display)?;
        wait_until(|| {
            if button.single_debounced_press() {
                return Ok(true);
            }
            let frame = hw.read_frame(line)?;
            display
                .show_bars(&frame.bar_levels())
                .map_err(NavError::display)?;
            Ok(false)
        })
    }
}
