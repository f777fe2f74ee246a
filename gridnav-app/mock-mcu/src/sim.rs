//! A simulated robot on a taped grid.
//!
//! Hardware trait implementations share one [`World`]. Simulated time only
//! moves when the robot touches its hardware: sensor and gyro reads cost a
//! fixed number of microseconds and delays advance the clock by their length.

use std::{cell::RefCell, convert::Infallible, f32::consts::PI, rc::Rc};

use embedded_hal::delay::DelayNs;
use gridnav_core::utils::{
    controllers::driver::{ConfirmButton, DriveMotors, Gyro, LineSensorArray, MicrosClock},
    sensors::line::SENSOR_COUNT,
};
use smart_leds_trait::{SmartLedsWrite, RGB8};
use tracing::{debug, error};

/// Wheel surface speed per motor unit, in m/s.
const SPEED_PER_UNIT: f32 = 0.0013;
/// Distance between the wheels, in meters.
const WHEEL_BASE: f32 = 0.085;
/// Sensor bar distance ahead of the axle, in meters.
const SENSOR_AHEAD: f32 = 0.030;
/// Lateral sensor offsets, leftmost first, in meters.
const SENSOR_OFFSETS: [f32; SENSOR_COUNT] = [0.024, 0.008, 0.0, -0.008, -0.024];
/// Half the tape width.
const LINE_HALF_WIDTH: f32 = 0.004;
/// Sensor footprint radius.
const SENSOR_RADIUS: f32 = 0.001;
/// Radius of the goal marker.
const DARK_SPOT_RADIUS: f32 = 0.040;
/// Raw reading over bare floor and the extra seen over tape.
const RAW_FLOOR: f32 = 150.0;
const RAW_SPAN: f32 = 1850.0;
/// Gyro resolution in degrees per second per raw unit.
const GYRO_DPS_PER_DIGIT: f32 = 0.070;
/// Constant gyro offset, in raw units.
const GYRO_BIAS: i16 = 15;
/// Microseconds spent in one reflectance read and one gyro read.
const SENSOR_READ_US: u64 = 1000;
const GYRO_READ_US: u64 = 1250;

pub type Node = (i32, i32);

/// Taped grid layout.
pub struct Maze {
    pub spacing: f32,
    pub edges: Vec<(Node, Node)>,
    pub goal: Node,
}

impl Maze {
    /// Three dead ends and the goal in the far corner.
    pub fn demo(spacing: f32) -> Self {
        Maze {
            spacing,
            edges: vec![
                ((0, 0), (1, 0)),
                ((1, 0), (2, 0)),
                ((1, 0), (1, 1)),
                ((1, 1), (0, 1)),
                ((1, 1), (2, 1)),
                ((2, 1), (2, 2)),
            ],
            goal: (2, 2),
        }
    }

    fn point(
        &self,
        node: Node,
    ) -> (f32, f32) {
        (node.0 as f32 * self.spacing, node.1 as f32 * self.spacing)
    }

    /// Distance from `(x, y)` to the nearest tape centerline.
    fn distance_to_line(
        &self,
        x: f32,
        y: f32,
    ) -> f32 {
        self.edges
            .iter()
            .map(|&(a, b)| {
                let (ax, ay) = self.point(a);
                let (bx, by) = self.point(b);
                segment_distance((x, y), (ax, ay), (bx, by))
            })
            .fold(f32::INFINITY, f32::min)
    }

    /// Raw reflectance at `(x, y)`.
    fn reflectance(
        &self,
        x: f32,
        y: f32,
    ) -> u16 {
        let (gx, gy) = self.point(self.goal);
        if (x - gx).hypot(y - gy) <= DARK_SPOT_RADIUS {
            return (RAW_FLOOR + RAW_SPAN) as u16;
        }
        let d = self.distance_to_line(x, y);
        let coverage = ((LINE_HALF_WIDTH + SENSOR_RADIUS - d) / (2.0 * SENSOR_RADIUS)).clamp(0.0, 1.0);
        (RAW_FLOOR + RAW_SPAN * coverage) as u16
    }
}

fn segment_distance(
    p: (f32, f32),
    a: (f32, f32),
    b: (f32, f32),
) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

/// Robot pose, wheel speeds and simulated time.
pub struct World {
    pub maze: Maze,
    pub x: f32,
    pub y: f32,
    /// Heading in radians, counter-clockwise from +x.
    pub theta: f32,
    left: i16,
    right: i16,
    /// Simulated microseconds since power-up.
    pub now_us: u64,
    deadline_us: u64,
}

pub type SharedWorld = Rc<RefCell<World>>;

impl World {
    /// Start on node (0, 0) facing +x.
    pub fn new(
        maze: Maze,
        max_seconds: u64,
    ) -> SharedWorld {
        Rc::new(RefCell::new(World {
            maze,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
            left: 0,
            right: 0,
            now_us: 0,
            deadline_us: max_seconds.saturating_mul(1_000_000),
        }))
    }

    fn wheel_speeds(&self) -> (f32, f32) {
        (
            f32::from(self.left) * SPEED_PER_UNIT,
            f32::from(self.right) * SPEED_PER_UNIT,
        )
    }

    /// Yaw rate in rad/s from the current wheel speeds.
    fn yaw_rate(&self) -> f32 {
        let (vl, vr) = self.wheel_speeds();
        (vr - vl) / WHEEL_BASE
    }

    /// Move the robot forward in time.
    fn advance(
        &mut self,
        us: u64,
    ) {
        let mut remaining = us;
        while remaining > 0 {
            let step = remaining.min(1000);
            let dt = step as f32 * 1e-6;
            let (vl, vr) = self.wheel_speeds();
            let v = (vl + vr) / 2.0;
            self.theta = (self.theta + self.yaw_rate() * dt).rem_euclid(2.0 * PI);
            self.x += v * self.theta.cos() * dt;
            self.y += v * self.theta.sin() * dt;
            remaining -= step;
        }
        self.now_us += us;

        if self.now_us > self.deadline_us {
            error!(
                seconds = self.now_us / 1_000_000,
                x = self.x,
                y = self.y,
                "simulation time limit reached"
            );
            std::process::exit(1);
        }
    }

    /// Nearest grid node and distance to it.
    pub fn nearest_node(&self) -> (Node, f32) {
        let s = self.maze.spacing;
        let node = ((self.x / s).round() as i32, (self.y / s).round() as i32);
        let (nx, ny) = self.maze.point(node);
        (node, (self.x - nx).hypot(self.y - ny))
    }

    fn sensor_readings(&self) -> [u16; SENSOR_COUNT] {
        let (c, s) = (self.theta.cos(), self.theta.sin());
        let bar_x = self.x + SENSOR_AHEAD * c;
        let bar_y = self.y + SENSOR_AHEAD * s;
        SENSOR_OFFSETS.map(|offset| {
            // Left of the heading is (-sin, cos).
            self.maze.reflectance(bar_x - offset * s, bar_y + offset * c)
        })
    }
}

pub struct SimMotors(pub SharedWorld);

impl DriveMotors for SimMotors {
    type Error = Infallible;

    fn set_speeds(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error> {
        let mut world = self.0.borrow_mut();
        world.left = left;
        world.right = right;
        Ok(())
    }
}

pub struct SimGyro(pub SharedWorld);

impl Gyro for SimGyro {
    type Error = Infallible;

    fn read_angular_rate(&mut self) -> Result<i16, Self::Error> {
        let mut world = self.0.borrow_mut();
        world.advance(GYRO_READ_US);
        let dps = world.yaw_rate().to_degrees();
        Ok((dps / GYRO_DPS_PER_DIGIT) as i16 + GYRO_BIAS)
    }
}

pub struct SimLineSensors(pub SharedWorld);

impl LineSensorArray for SimLineSensors {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<[u16; SENSOR_COUNT], Self::Error> {
        let mut world = self.0.borrow_mut();
        world.advance(SENSOR_READ_US);
        Ok(world.sensor_readings())
    }
}

pub struct SimClock(pub SharedWorld);

impl MicrosClock for SimClock {
    fn now_micros(&mut self) -> u16 {
        self.0.borrow().now_us as u16
    }
}

pub struct SimDelay(pub SharedWorld);

impl DelayNs for SimDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0.borrow_mut().advance(u64::from(ns).div_ceil(1000));
    }
}

/// An operator who lets go and presses again after a number of polls.
pub struct SimButton {
    pub release_after: u32,
    pub press_after: u32,
    polls: u32,
}

impl SimButton {
    pub fn new(
        release_after: u32,
        press_after: u32,
    ) -> Self {
        SimButton {
            release_after,
            press_after,
            polls: 0,
        }
    }
}

impl ConfirmButton for SimButton {
    fn single_debounced_press(&mut self) -> bool {
        self.polls += 1;
        if self.polls > self.press_after {
            self.polls = 0;
            return true;
        }
        false
    }

    fn single_debounced_release(&mut self) -> bool {
        self.polls += 1;
        if self.polls > self.release_after {
            self.polls = 0;
            return true;
        }
        false
    }
}

/// LED strip that logs what it would show.
pub struct LogLedDriver;

impl SmartLedsWrite for LogLedDriver {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(
        &mut self,
        iterator: T,
    ) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let levels: Vec<u8> = iterator
            .into_iter()
            .map(|c| {
                let c: RGB8 = c.into();
                c.g
            })
            .collect();
        debug!(?levels, "LED bar");
        Ok(())
    }
}
