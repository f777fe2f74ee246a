//! Whole-robot scenarios over scripted hardware.

use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embedded_hal::delay::DelayNs;
use gridnav_core::utils::{
    controllers::{
        driver::{
            ConfirmButton, DriveMotors, Gyro, Hardware, LineSensorArray, MicrosClock, MotorCommand,
        },
        leds::LedBar,
        CalibrationState, NavCommand, NavEvent,
    },
    sensors::line::{CalibrationRange, SENSOR_COUNT},
    GridRobot, IntersectionReport, SegmentEnd, TurnDirection,
};
use smart_leds_trait::{SmartLedsWrite, RGB8};

type Frame = [u16; SENSOR_COUNT];

const OFF: Frame = [0, 0, 0, 0, 0];
const CENTERED: Frame = [0, 0, 1000, 0, 0];
const CROSSING: Frame = [1000, 1000, 1000, 1000, 1000];

#[derive(Clone, Default)]
struct Motors(Rc<RefCell<Vec<MotorCommand>>>);

impl DriveMotors for Motors {
    type Error = Infallible;

    fn set_speeds(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(MotorCommand::new(left, right));
        Ok(())
    }
}

/// Turns at a rate proportional to the last wheel-speed difference.
struct FollowingGyro(Motors);

impl Gyro for FollowingGyro {
    type Error = Infallible;

    fn read_angular_rate(&mut self) -> Result<i16, Self::Error> {
        let last = self.0 .0.borrow().last().copied().unwrap_or_default();
        Ok((10 * (i32::from(last.right) - i32::from(last.left)) / 2) as i16)
    }
}

struct Script {
    frames: Vec<Frame>,
    reads: usize,
}

impl LineSensorArray for Script {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<Frame, Self::Error> {
        let frame = self.frames[self.reads.min(self.frames.len() - 1)];
        self.reads += 1;
        Ok(frame)
    }
}

struct StepClock(u16);

impl MicrosClock for StepClock {
    fn now_micros(&mut self) -> u16 {
        self.0 = self.0.wrapping_add(1000);
        self.0
    }
}

#[derive(Default)]
struct NoDelay(u64);

impl DelayNs for NoDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0 += u64::from(ns);
    }
}

type Robot = GridRobot<Motors, FollowingGyro, Script, StepClock, NoDelay>;

fn robot(frames: Vec<Frame>) -> (Robot, Motors) {
    let motors = Motors::default();
    let hw = Hardware::new(
        motors.clone(),
        FollowingGyro(motors.clone()),
        Script { frames, reads: 0 },
        StepClock(0),
        NoDelay::default(),
    );
    (GridRobot::new(hw, None), motors)
}

fn calibrated(frames: Vec<Frame>) -> (Robot, Motors) {
    let (mut robot, motors) = robot(frames);
    robot.restore_calibration(CalibrationState {
        ranges: [CalibrationRange::new(0, 1000); SENSOR_COUNT],
        gyro_bias: 0,
    });
    (robot, motors)
}

#[test]
fn halts_at_intersection_on_cycle_51() {
    let mut frames = vec![CENTERED; 50];
    frames.push(CROSSING);
    let (mut robot, motors) = calibrated(frames);

    assert_eq!(robot.follow_segment(), Ok(SegmentEnd::Intersection));
    assert_eq!(robot.hw.sensors.reads, 51);
    let sent = motors.0.borrow();
    assert_eq!(sent.len(), 50);
    assert!(sent.iter().all(|c| *c == MotorCommand::new(200, 200)));
}

#[test]
fn dead_end_sends_no_commands() {
    let (mut robot, motors) = calibrated(vec![OFF]);

    assert_eq!(robot.follow_segment(), Ok(SegmentEnd::DeadEnd));
    assert_eq!(robot.hw.sensors.reads, 1);
    assert!(motors.0.borrow().is_empty());
}

#[test]
fn follow_probe_turn_follow() {
    let mut frames = vec![CENTERED; 50];
    frames.push(CROSSING);
    // 130 ms of probing at one clock step per cycle, then the look ahead.
    frames.extend(std::iter::repeat([1000, 0, 1000, 0, 0]).take(130));
    frames.push(CENTERED);
    // Fine alignment of the left turn.
    frames.push(OFF);
    frames.push([0, 800, 0, 0, 0]);
    // Next segment ends immediately.
    frames.push(OFF);
    let (mut robot, motors) = calibrated(frames);

    let events: Vec<NavEvent> = [
        NavCommand::Follow,
        NavCommand::Probe,
        NavCommand::Turn {
            d: TurnDirection::Left,
        },
        NavCommand::Follow,
    ]
    .into_iter()
    .map(|cmd| robot.execute_command(cmd).unwrap())
    .collect();

    assert_eq!(
        events,
        [
            NavEvent::SegmentEnded {
                end: SegmentEnd::Intersection,
                dark_spot: true,
            },
            NavEvent::Probed {
                report: IntersectionReport {
                    found_left: true,
                    found_straight: true,
                    found_right: false,
                },
                dark_spot: false,
            },
            NavEvent::Turned {
                d: TurnDirection::Left
            },
            NavEvent::SegmentEnded {
                end: SegmentEnd::DeadEnd,
                dark_spot: false,
            },
        ]
    );

    let sent = motors.0.borrow();
    assert_eq!(
        sent[50..],
        [
            MotorCommand::new(200, 200),
            MotorCommand::new(-200, 200),
            MotorCommand::STOP
        ]
    );
    assert!(robot.heading.degrees() >= 45);
}

#[derive(Default)]
struct Strip {
    writes: usize,
}

impl SmartLedsWrite for Strip {
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
        assert_eq!(iterator.into_iter().count(), SENSOR_COUNT);
        self.writes += 1;
        Ok(())
    }
}

/// Released after a few heading updates, pressed after a few bar graphs.
struct Operator {
    polls: usize,
}

impl ConfirmButton for Operator {
    fn single_debounced_press(&mut self) -> bool {
        self.polls += 1;
        self.polls > 6
    }

    fn single_debounced_release(&mut self) -> bool {
        self.polls += 1;
        self.polls > 3
    }
}

#[test]
fn calibration_on_led_bar_enables_motion() {
    let mut frames = vec![[150, 160, 170, 180, 190]; 10];
    frames.push([1800; SENSOR_COUNT]);
    let (mut robot, motors) = robot(frames);
    let mut display = LedBar::new(Strip::default());
    let mut operator = Operator { polls: 0 };

    assert!(robot.execute_command(NavCommand::Follow).is_err());
    robot.calibrate(&mut display, &mut operator).unwrap();
    assert!(robot.is_calibrated());

    let state = robot.calibration_state();
    assert_eq!(state.ranges[0], CalibrationRange::new(150, 1800));
    assert_eq!(state.ranges[4], CalibrationRange::new(190, 1800));
    assert_eq!(motors.0.borrow().last(), Some(&MotorCommand::STOP));

    // 1.5 s of settling pauses.
    assert_eq!(robot.hw.delay.0, 1_500_000_000);

    // Over the line everywhere: an outer sensor sees it straight away.
    assert_eq!(
        robot.execute_command(NavCommand::Follow),
        Ok(NavEvent::SegmentEnded {
            end: SegmentEnd::Intersection,
            dark_spot: true,
        })
    );
}
