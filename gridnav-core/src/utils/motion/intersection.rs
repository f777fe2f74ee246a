//! Centering on an intersection and reporting its exits.

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::driver::{
        DriveMotors, Hardware, LineSensorArray, MicrosClock, MotorCommand, NavError,
    },
    motion::TurnDirection,
    sensors::line::{LineSensorFrontEnd, ThresholdKind, SENSOR_COUNT},
};

/// Exits seen while driving into an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntersectionReport {
    pub found_left: bool,
    pub found_straight: bool,
    pub found_right: bool,
}

impl IntersectionReport {
    /// Whether the exit reached by turning `direction` exists. `Back` always does.
    pub fn has_exit(
        &self,
        direction: TurnDirection,
    ) -> bool {
        match direction {
            TurnDirection::Left => self.found_left,
            TurnDirection::Straight => self.found_straight,
            TurnDirection::Right => self.found_right,
            TurnDirection::Back => true,
        }
    }

    pub fn exit_count(&self) -> usize {
        usize::from(self.found_left) + usize::from(self.found_straight) + usize::from(self.found_right)
    }
}

pub struct IntersectionProber {
    speed: i16,
    centering_ms: u32,
}

impl IntersectionProber {
    pub fn new(
        speed: i16,
        centering_ms: u32,
    ) -> Self {
        Self {
            speed,
            centering_ms,
        }
    }

    /// Drive forward to the intersection center without looking at the sensors.
    pub fn center<M, G, S, C, D>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
    ) -> Result<(), NavError>
    where
        M: DriveMotors,
        D: DelayNs,
    {
        hw.drive(MotorCommand::straight(self.speed))?;
        hw.pause_ms(self.centering_ms);
        Ok(())
    }

    /// Drive to the intersection center while latching side exits, then check ahead.
    ///
    /// Elapsed time is summed from wrapping clock differences, so it may exceed
    /// the 16-bit clock period as long as each cycle stays shorter than it.
    pub fn probe<M, G, S, C, D>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        line: &mut LineSensorFrontEnd,
    ) -> Result<IntersectionReport, NavError>
    where
        M: DriveMotors,
        S: LineSensorArray,
        C: MicrosClock,
    {
        let mut report = IntersectionReport::default();
        let duration_us = self.centering_ms.saturating_mul(1000);

        hw.drive(MotorCommand::straight(self.speed))?;

        let mut last = hw.clock.now_micros();
        let mut elapsed: u32 = 0;
        while elapsed < duration_us {
            hw.read_frame(line)?;
            if line.is_above_threshold(0, ThresholdKind::Line) {
                report.found_left = true;
            }
            if line.is_above_threshold(SENSOR_COUNT - 1, ThresholdKind::Line) {
                report.found_right = true;
            }

            let now = hw.clock.now_micros();
            elapsed += u32::from(now.wrapping_sub(last));
            last = now;
        }

        hw.read_frame(line)?;
        report.found_straight = line.any_on_line(1..SENSOR_COUNT - 1);

        tracing::info!(?report, "intersection probed");
        Ok(report)
    }
}
