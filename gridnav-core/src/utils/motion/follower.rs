//! Proportional line following along one grid segment.
//!
//! Each cycle reads a frame, checks whether the segment has ended, and
//! otherwise steers toward the line. Wheel speeds stay within `0..=base`, so
//! neither wheel ever reverses while following.

use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::driver::{DriveMotors, Hardware, LineSensorArray, MotorCommand, NavError},
    motion::wait_until,
    sensors::line::{LineSensorFrontEnd, CENTER_POSITION, SENSOR_COUNT},
};

/// Why a segment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentEnd {
    /// No sensor sees a line.
    DeadEnd,
    /// An outer sensor sees a line. Also fires on a dark end marker.
    Intersection,
}

/// Follower state after one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Following,
    Halted(SegmentEnd),
}

pub struct SegmentFollower {
    base_speed: i16,
    divisor: i16,
}

impl SegmentFollower {
    pub fn new(
        base_speed: i16,
        divisor: i16,
    ) -> Self {
        Self {
            base_speed: base_speed.max(0),
            divisor: divisor.max(1),
        }
    }

    /// Wheel speeds for a line at `position`.
    pub fn steer(
        &self,
        position: u16,
    ) -> MotorCommand {
        let error = i32::from(position) - i32::from(CENTER_POSITION);
        let difference = error / i32::from(self.divisor);
        let base = i32::from(self.base_speed);

        let left = (base + difference).clamp(0, base);
        let right = (base - difference).clamp(0, base);
        MotorCommand::new(left as i16, right as i16)
    }

    /// Termination check against the last frame.
    pub fn classify(line: &LineSensorFrontEnd) -> FollowState {
        if !line.any_on_line(0..SENSOR_COUNT) {
            FollowState::Halted(SegmentEnd::DeadEnd)
        } else if line.outer_on_line() {
            FollowState::Halted(SegmentEnd::Intersection)
        } else {
            FollowState::Following
        }
    }

    /// One control cycle: read, check for the end of the segment, then steer.
    ///
    /// The halting cycle issues no motor command; the drive keeps its last speeds.
    pub fn step<M, G, S, C, D>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        line: &mut LineSensorFrontEnd,
    ) -> Result<FollowState, NavError>
    where
        M: DriveMotors,
        S: LineSensorArray,
    {
        let frame = hw.read_frame(line)?;

        let state = Self::classify(line);
        if state == FollowState::Following {
            let command = self.steer(frame.position);
            tracing::trace!(position = frame.position, ?command, "following");
            hw.drive(command)?;
        }
        Ok(state)
    }

    /// Follow until the segment ends. Blocks for as long as the line continues.
    pub fn run<M, G, S, C, D>(
        &self,
        hw: &mut Hardware<M, G, S, C, D>,
        line: &mut LineSensorFrontEnd,
    ) -> Result<SegmentEnd, NavError>
    where
        M: DriveMotors,
        S: LineSensorArray,
    {
        let mut end = SegmentEnd::DeadEnd;
        wait_until(|| match self.step(hw, line)? {
            FollowState::Following => Ok(false),
            FollowState::Halted(reason) => {
                end = reason;
                Ok(true)
            }
        })?;

        tracing::info!(?end, "segment ended");
        Ok(end)
    }
}
