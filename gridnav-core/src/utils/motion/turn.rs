//! Two-phase turns: gyro for the bulk of the rotation, a line sensor to land.
//!
//! The gyro alone drifts and the wheels slip, so the coarse phase only turns
//! far enough to be close to the new line. The fine phase keeps spinning until
//! an inner sensor on the side of the target line crosses it.

use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::driver::{
        DriveMotors, Gyro, Hardware, LineSensorArray, MicrosClock, MotorCommand, NavError,
    },
    math::heading::{HeadingTracker, ANGLE_45},
    motion::wait_until,
    sensors::line::{LineSensorFrontEnd, ThresholdKind},
};

/// Commanded direction at an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Left,
    Right,
    Back,
    Straight,
}

impl TurnDirection {
    /// Parse the one-letter form used in maze paths (`L`, `R`, `B`, `S`).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'L' => Some(TurnDirection::Left),
            'R' => Some(TurnDirection::Right),
            'B' => Some(TurnDirection::Back),
            'S' => Some(TurnDirection::Straight),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TurnDirection::Left => 'L',
            TurnDirection::Right => 'R',
            TurnDirection::Back => 'B',
            TurnDirection::Straight => 'S',
        }
    }

    /// Signed heading at which the gyro phase ends. `Back` turns left.
    pub fn gyro_target(self) -> i64 {
        match self {
            TurnDirection::Left => ANGLE_45,
            TurnDirection::Back => ANGLE_45 * 3,
            TurnDirection::Right => -ANGLE_45,
            TurnDirection::Straight => 0,
        }
    }

    /// Inner sensor on the side of the target line.
    pub fn landing_sensor(self) -> usize {
        match self {
            TurnDirection::Right => 3,
            _ => 1,
        }
    }

    /// Spin in place at `speed`.
    pub fn spin(
        self,
        speed: i16,
    ) -> MotorCommand {
        match self {
            TurnDirection::Right => MotorCommand::new(speed, -speed),
            TurnDirection::Straight => MotorCommand::STOP,
            _ => MotorCommand::new(-speed, speed),
        }
    }

    /// Whether the gyro phase is finished at `angle`.
    fn reached(
        self,
        angle: i64,
    ) -> bool {
        let target = self.gyro_target();
        if target >= 0 {
            angle >= target
        } else {
            angle <= target
        }
    }
}

/// Turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    CoarseRotating,
    FineAligning,
    Done,
}

pub struct TurnExecutor {
    turn_speed: i16,
    direction: TurnDirection,
    phase: TurnPhase,
}

impl TurnExecutor {
    pub fn new(turn_speed: i16) -> Self {
        Self {
            turn_speed,
            direction: TurnDirection::Straight,
            phase: TurnPhase::Done,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn direction(&self) -> TurnDirection {
        self.direction
    }

    /// Reset the heading and start spinning. `Straight` is done immediately.
    pub fn begin<M, G, S, C, D>(
        &mut self,
        direction: TurnDirection,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
    ) -> Result<TurnPhase, NavError>
    where
        M: DriveMotors,
        C: MicrosClock,
    {
        self.direction = direction;
        if direction == TurnDirection::Straight {
            self.phase = TurnPhase::Done;
            return Ok(self.phase);
        }

        hw.reset_heading(heading);
        hw.drive(direction.spin(self.turn_speed))?;
        self.phase = TurnPhase::CoarseRotating;
        tracing::debug!(?direction, "turn started");
        Ok(self.phase)
    }

    /// Advance the turn by one cycle.
    ///
    /// Coarse: integrate one gyro sample and move on once the target heading is
    /// crossed. Fine: read one frame and stop once the landing sensor sees the line.
    pub fn step<M, G, S, C, D>(
        &mut self,
        hw: &mut Hardware<M, G, S, C, D>,
        heading: &mut HeadingTracker,
        line: &mut LineSensorFrontEnd,
    ) -> Result<TurnPhase, NavError>
    where
        M: DriveMotors,
        G: Gyro,
        S: LineSensorArray,
        C: MicrosClock,
    {
        match self.phase {
            TurnPhase::CoarseRotating => {
                hw.update_heading(heading)?;
                if self.direction.reached(heading.angle()) {
                    tracing::debug!(degrees = heading.degrees(), "gyro phase done");
                    self.phase = TurnPhase::FineAligning;
                }
            }
            TurnPhase::FineAligning => {
                hw.read_frame(line)?;
                if line.is_above_threshold(self.direction.landing_sensor(), ThresholdKind::Line) {
                    hw.drive(MotorCommand::STOP)?;
                    self.phase = TurnPhase::Done;
                }
            }
            TurnPhase::Done => {}
        }
        Ok(self.phase)
    }

    /// Run a whole turn. Blocks until the landing sensor finds a line.
    pub fn execute<M, G, S, C, D>(
        &mut self,
        direction: TurnDirection,
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
        if self.begin(direction, hw, heading)? == TurnPhase::Done {
            return Ok(());
        }
        wait_until(|| Ok(self.step(hw, heading, line)? == TurnPhase::Done))?;

        tracing::info!(?direction, "turn complete");
        Ok(())
    }
}
