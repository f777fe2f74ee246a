//! In-crate fakes for unit tests.

use core::{cell::RefCell, convert::Infallible};
use std::{rc::Rc, string::String, vec::Vec};

use embedded_hal::delay::DelayNs;

use crate::utils::{
    controllers::driver::{
        ConfirmButton, Display, DriveMotors, Gyro, Hardware, LineSensorArray, MicrosClock,
        MotorCommand,
    },
    sensors::line::{CalibrationRange, LineSensorFrontEnd, SENSOR_COUNT},
};

pub type Commands = Rc<RefCell<Vec<MotorCommand>>>;

pub type TestHardware = Hardware<RecordingMotors, SpinGyro, ScriptedSensors, FakeClock, FakeDelay>;

/// Front end with a 0..1000 range on every sensor, so raw equals calibrated.
pub fn unit_front_end() -> LineSensorFrontEnd {
    let mut front = LineSensorFrontEnd::new(200, 600);
    front.set_calibration([CalibrationRange::new(0, 1000); SENSOR_COUNT]);
    front
}

/// Hardware whose gyro turns with the last motor command.
pub fn rig(frames: &[[u16; SENSOR_COUNT]]) -> TestHardware {
    let motors = RecordingMotors::default();
    let gyro = SpinGyro {
        bias: 0,
        gain: 10,
        commands: motors.commands.clone(),
        reads: 0,
    };
    Hardware::new(
        motors,
        gyro,
        ScriptedSensors::new(frames),
        FakeClock::new(1000),
        FakeDelay::default(),
    )
}

#[derive(Default)]
pub struct RecordingMotors {
    pub commands: Commands,
}

impl RecordingMotors {
    pub fn sent(&self) -> Vec<MotorCommand> {
        self.commands.borrow().clone()
    }
}

impl DriveMotors for RecordingMotors {
    type Error = Infallible;

    fn set_speeds(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error> {
        self.commands.borrow_mut().push(MotorCommand::new(left, right));
        Ok(())
    }
}

/// Reports `bias + gain * (right - left) / 2` for the latest motor command.
pub struct SpinGyro {
    pub bias: i16,
    pub gain: i16,
    pub commands: Commands,
    pub reads: usize,
}

impl Gyro for SpinGyro {
    type Error = Infallible;

    fn read_angular_rate(&mut self) -> Result<i16, Self::Error> {
        self.reads += 1;
        let last = self.commands.borrow().last().copied().unwrap_or_default();
        let spin = (i32::from(last.right) - i32::from(last.left)) / 2;
        Ok((i32::from(self.bias) + i32::from(self.gain) * spin) as i16)
    }
}

/// Cycles through a fixed list of samples.
pub struct ConstGyro {
    samples: Vec<i16>,
    pub reads: usize,
}

impl ConstGyro {
    pub fn new(samples: &[i16]) -> Self {
        Self {
            samples: samples.to_vec(),
            reads: 0,
        }
    }
}

impl Gyro for ConstGyro {
    type Error = Infallible;

    fn read_angular_rate(&mut self) -> Result<i16, Self::Error> {
        let sample = self.samples[self.reads % self.samples.len()];
        self.reads += 1;
        Ok(sample)
    }
}

/// Plays frames in order, then repeats the last one.
pub struct ScriptedSensors {
    frames: Vec<[u16; SENSOR_COUNT]>,
    pub reads: usize,
}

impl ScriptedSensors {
    pub fn new(frames: &[[u16; SENSOR_COUNT]]) -> Self {
        Self {
            frames: frames.to_vec(),
            reads: 0,
        }
    }
}

impl LineSensorArray for ScriptedSensors {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<[u16; SENSOR_COUNT], Self::Error> {
        let index = self.reads.min(self.frames.len().saturating_sub(1));
        self.reads += 1;
        Ok(self.frames.get(index).copied().unwrap_or([0; SENSOR_COUNT]))
    }
}

/// Advances by a fixed step every time it is read.
pub struct FakeClock {
    pub now: u16,
    pub step: u16,
}

impl FakeClock {
    pub fn new(step: u16) -> Self {
        Self { now: 0, step }
    }
}

impl MicrosClock for FakeClock {
    fn now_micros(&mut self) -> u16 {
        let now = self.now;
        self.now = self.now.wrapping_add(self.step);
        now
    }
}

#[derive(Default)]
pub struct FakeDelay {
    pub total_ns: u64,
}

impl DelayNs for FakeDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.total_ns += u64::from(ns);
    }
}

#[derive(Default)]
pub struct FakeDisplay {
    pub messages: Vec<String>,
    pub headings: Vec<i32>,
    pub bars: Vec<[u8; SENSOR_COUNT]>,
    pub clears: usize,
}

impl Display for FakeDisplay {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.clears += 1;
        Ok(())
    }

    fn show_message(
        &mut self,
        message: &str,
    ) -> Result<(), Self::Error> {
        self.messages.push(String::from(message));
        Ok(())
    }

    fn show_heading(
        &mut self,
        degrees: i32,
    ) -> Result<(), Self::Error> {
        self.headings.push(degrees);
        Ok(())
    }

    fn show_bars(
        &mut self,
        levels: &[u8; SENSOR_COUNT],
    ) -> Result<(), Self::Error> {
        self.bars.push(*levels);
        Ok(())
    }
}

/// Reports a release after `release_after` polls and a press after `press_after` polls.
pub struct FakeButton {
    pub release_after: usize,
    pub press_after: usize,
    pub release_polls: usize,
    pub press_polls: usize,
}

impl FakeButton {
    pub fn new(
        release_after: usize,
        press_after: usize,
    ) -> Self {
        Self {
            release_after,
            press_after,
            release_polls: 0,
            press_polls: 0,
        }
    }
}

impl ConfirmButton for FakeButton {
    fn single_debounced_press(&mut self) -> bool {
        self.press_polls += 1;
        self.press_polls > self.press_after
    }

    fn single_debounced_release(&mut self) -> bool {
        self.release_polls += 1;
        self.release_polls > self.release_after
    }
}
