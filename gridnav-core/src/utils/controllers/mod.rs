//! Robot-level control.
//!
//! - `driver`: hardware traits, the [`driver::Hardware`] bundle and [`driver::NavError`]
//! - `i2c`: PCA9685 motor drive and ICM-42670 gyro adapters
//! - `leds`: addressable LED bar used as the calibration display
//!
//! [`GridRobot`] owns every navigation component and executes [`NavCommand`]s
//! received over [`NAV_CHANNEL`], answering each with a [`NavEvent`] on
//! [`NAV_EVENTS`].

pub mod driver;
pub mod i2c;
pub mod leds;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::utils::{
    config::GridConfig,
    math::heading::HeadingTracker,
    motion::{
        CalibrationSequencer, IntersectionProber, IntersectionReport, SegmentEnd, SegmentFollower,
        TurnDirection, TurnExecutor,
    },
    sensors::line::{CalibrationRange, LineSensorFrontEnd, SENSOR_COUNT},
};
use driver::{
    ConfirmButton, Display, DriveMotors, Gyro, Hardware, LineSensorArray, MicrosClock,
    MotorCommand, NavError,
};

/// Commands for the navigation loop.
pub static NAV_CHANNEL: Channel<CriticalSectionRawMutex, NavCommand, 16> = Channel::new();

/// Outcome of each command taken from [`NAV_CHANNEL`].
pub static NAV_EVENTS: Channel<CriticalSectionRawMutex, NavEvent, 16> = Channel::new();

/// Motion commands, serialized as JSON with tag `"nc"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nc", rename_all = "snake_case")] // nc = nav command
pub enum NavCommand {
    /// Follow the current segment to its end.
    Follow,
    /// Drive to the intersection center without looking at the sensors.
    Center,
    /// Drive to the intersection center and report its exits.
    Probe,
    Turn { d: TurnDirection },
    Stop,
}

/// Results reported back to the policy, tagged `"ne"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ne", rename_all = "snake_case")] // ne = nav event
pub enum NavEvent {
    Calibrated,
    SegmentEnded {
        end: SegmentEnd,
        dark_spot: bool,
    },
    Centered,
    Probed {
        report: IntersectionReport,
        dark_spot: bool,
    },
    Turned {
        d: TurnDirection,
    },
    Stopped,
    Failed {
        error: NavError,
    },
}

/// Everything learned during calibration, for saving and restoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationState {
    pub ranges: [CalibrationRange; SENSOR_COUNT],
    pub gyro_bias: i16,
}

/// A line-grid robot: hardware plus every navigation component.
pub struct GridRobot<M, G, S, C, D> {
    pub hw: Hardware<M, G, S, C, D>,
    pub heading: HeadingTracker,
    pub line: LineSensorFrontEnd,
    follower: SegmentFollower,
    turner: TurnExecutor,
    prober: IntersectionProber,
    calibrator: CalibrationSequencer,
    config: GridConfig,
    calibrated: bool,
}

impl<M, G, S, C, D> GridRobot<M, G, S, C, D>
where
    M: DriveMotors,
    G: Gyro,
    S: LineSensorArray,
    C: MicrosClock,
    D: DelayNs,
{
    /// Build a robot over `hw`. Without a config the defaults are used.
    pub fn new(
        mut hw: Hardware<M, G, S, C, D>,
        config: Option<GridConfig>,
    ) -> Self {
        let config = config.unwrap_or_default().normalized();
        hw.max_speed = config.max_speed;

        tracing::info!(?config, "grid robot ready");
        GridRobot {
            hw,
            heading: HeadingTracker::new(config.gyro_scale),
            line: LineSensorFrontEnd::new(config.line_threshold, config.dark_threshold),
            follower: SegmentFollower::new(config.straight_speed, config.follow_divisor),
            turner: TurnExecutor::new(config.turn_speed),
            prober: IntersectionProber::new(config.straight_speed, config.intersection_delay_ms),
            calibrator: CalibrationSequencer::new(
                config.calibration_speed,
                config.gyro_bias_samples,
                config.gyro_settle_ms,
                config.line_settle_ms,
            ),
            config,
            calibrated: false,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Run the full calibration sequence from scratch, discarding any earlier ranges.
    pub fn calibrate<P, B>(
        &mut self,
        display: &mut P,
        button: &mut B,
    ) -> Result<(), NavError>
    where
        P: Display,
        B: ConfirmButton,
    {
        self.calibrated = false;
        self.line.reset_calibration();
        self.calibrator.run(
            &mut self.hw,
            &mut self.heading,
            &mut self.line,
            display,
            button,
        )?;
        self.calibrated = true;
        Ok(())
    }

    pub fn calibration_state(&self) -> CalibrationState {
        CalibrationState {
            ranges: *self.line.calibration(),
            gyro_bias: self.heading.bias(),
        }
    }

    /// Reuse a saved calibration instead of running the sequence.
    pub fn restore_calibration(
        &mut self,
        state: CalibrationState,
    ) {
        self.line.set_calibration(state.ranges);
        self.heading.set_bias(state.gyro_bias);
        self.calibrated = true;
        tracing::info!(?state, "calibration restored");
    }

    pub fn follow_segment(&mut self) -> Result<SegmentEnd, NavError> {
        self.follower.run(&mut self.hw, &mut self.line)
    }

    pub fn drive_to_intersection_center(&mut self) -> Result<(), NavError> {
        self.prober.center(&mut self.hw)
    }

    pub fn probe_intersection(&mut self) -> Result<IntersectionReport, NavError> {
        self.prober.probe(&mut self.hw, &mut self.line)
    }

    pub fn turn(
        &mut self,
        direction: TurnDirection,
    ) -> Result<(), NavError> {
        self.turner
            .execute(direction, &mut self.hw, &mut self.heading, &mut self.line)
    }

    /// Dark-marker check against the most recent frame.
    pub fn is_over_dark_spot(&self) -> bool {
        self.line.is_over_dark_spot()
    }

    pub fn stop(&mut self) -> Result<(), NavError> {
        self.hw.drive(MotorCommand::STOP)
    }

    /// Run one command to completion. Motion commands need a calibrated robot.
    pub fn execute_command(
        &mut self,
        command: NavCommand,
    ) -> Result<NavEvent, NavError> {
        if command == NavCommand::Stop {
            self.stop()?;
            return Ok(NavEvent::Stopped);
        }
        if !self.calibrated {
            tracing::warn!(?command, "rejected: not calibrated");
            return Err(NavError::NotCalibrated);
        }

        match command {
            NavCommand::Follow => {
                let end = self.follow_segment()?;
                Ok(NavEvent::SegmentEnded {
                    end,
                    dark_spot: self.is_over_dark_spot(),
                })
            }
            NavCommand::Center => {
                self.drive_to_intersection_center()?;
                Ok(NavEvent::Centered)
            }
            NavCommand::Probe => {
                let report = self.probe_intersection()?;
                Ok(NavEvent::Probed {
                    report,
                    dark_spot: self.is_over_dark_spot(),
                })
            }
            NavCommand::Turn { d } => {
                self.turn(d)?;
                Ok(NavEvent::Turned { d })
            }
            NavCommand::Stop => Ok(NavEvent::Stopped),
        }
    }

    pub async fn nav_ch(&mut self) -> ! {
        loop {
            let command = NAV_CHANNEL.receiver().receive().await;
            tracing::info!(?command, "received nav command");
            let event = match self.execute_command(command) {
                Ok(event) => event,
                Err(error) => {
                    tracing::error!(?command, %error, "nav command failed");
                    NavEvent::Failed { error }
                }
            };
            NAV_EVENTS.sender().send(event).await;
        }
    }
}
