mod sim;

use clap::Parser;
use embassy_executor::Executor;
use gridnav_core::utils::{
    controllers::{driver::Hardware, leds::LedBar, NavCommand, NavEvent, NAV_CHANNEL, NAV_EVENTS},
    GridConfig, GridRobot, IntersectionReport, TurnDirection,
};
use sim::{
    LogLedDriver, Maze, SharedWorld, SimButton, SimClock, SimDelay, SimGyro, SimLineSensors,
    SimMotors, World,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// Distance between grid nodes, in meters
    #[clap(long, default_value_t = 0.25)]
    spacing: f32,
    /// Give up after this many simulated seconds
    #[clap(long, default_value_t = 120)]
    max_seconds: u64,
    /// Tuning overrides as JSON, e.g. '{"straight_speed":150}'
    #[clap(long)]
    config: Option<String>,
    /// Button polls before the simulated operator releases or presses
    #[clap(long, default_value_t = 200)]
    operator_polls: u32,
}

type SimRobot = GridRobot<SimMotors, SimGyro, SimLineSensors, SimClock, SimDelay>;

#[embassy_executor::task]
async fn nav_task(
    mut robot: SimRobot,
    operator_polls: u32,
) -> ! {
    let mut display = LedBar::new(LogLedDriver);
    let mut button = SimButton::new(operator_polls, operator_polls);

    let event = match robot.calibrate(&mut display, &mut button) {
        Ok(()) => NavEvent::Calibrated,
        Err(error) => NavEvent::Failed { error },
    };
    NAV_EVENTS.sender().send(event).await;

    robot.nav_ch().await
}

/// Send one command and wait for its outcome.
async fn request(command: NavCommand) -> NavEvent {
    NAV_CHANNEL.sender().send(command).await;
    NAV_EVENTS.receiver().receive().await
}

fn fail(event: NavEvent) -> ! {
    error!(?event, "unexpected navigation event");
    std::process::exit(1);
}

/// Left-hand rule: prefer left, then straight, then right.
fn select_turn(report: &IntersectionReport) -> TurnDirection {
    [
        TurnDirection::Left,
        TurnDirection::Straight,
        TurnDirection::Right,
    ]
    .into_iter()
    .find(|d| report.has_exit(*d))
    .unwrap_or(TurnDirection::Back)
}

/// Collapse a trailing `xBy` into the single turn with the same total angle.
fn simplify(path: &mut Vec<TurnDirection>) {
    let n = path.len();
    if n < 3 || path[n - 2] != TurnDirection::Back {
        return;
    }
    let total: u32 = path[n - 3..]
        .iter()
        .map(|d| match d {
            TurnDirection::Straight => 0,
            TurnDirection::Right => 90,
            TurnDirection::Back => 180,
            TurnDirection::Left => 270,
        })
        .sum();
    path.truncate(n - 3);
    path.push(match total % 360 {
        0 => TurnDirection::Straight,
        90 => TurnDirection::Right,
        180 => TurnDirection::Back,
        _ => TurnDirection::Left,
    });
}

fn letters(path: &[TurnDirection]) -> String {
    path.iter().map(|d| d.as_char()).collect()
}

#[embassy_executor::task]
async fn policy_task(world: SharedWorld) {
    match NAV_EVENTS.receiver().receive().await {
        NavEvent::Calibrated => info!("calibration done, exploring"),
        other => fail(other),
    }

    let mut path = Vec::new();
    loop {
        match request(NavCommand::Follow).await {
            NavEvent::SegmentEnded { end, .. } => debug!(?end, "segment ended"),
            other => fail(other),
        }
        let report = match request(NavCommand::Probe).await {
            NavEvent::Probed {
                dark_spot: true, ..
            } => break,
            NavEvent::Probed { report, .. } => report,
            other => fail(other),
        };

        let direction = select_turn(&report);
        path.push(direction);
        simplify(&mut path);
        {
            let world = world.borrow();
            let (node, offset) = world.nearest_node();
            info!(?node, offset_mm = offset * 1000.0, ?report, ?direction, path = %letters(&path), "at intersection");
        }

        match request(NavCommand::Turn { d: direction }).await {
            NavEvent::Turned { .. } => {}
            other => fail(other),
        }
    }

    request(NavCommand::Stop).await;
    let world = world.borrow();
    info!(
        node = ?world.nearest_node().0,
        seconds = world.now_us as f32 * 1e-6,
        path = %letters(&path),
        "goal reached"
    );
    std::process::exit(0);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let opts: Opts = Opts::parse();

    let config = match opts.config.as_deref().map(serde_json::from_str::<GridConfig>) {
        None => None,
        Some(Ok(config)) => Some(config),
        Some(Err(e)) => {
            error!(%e, "invalid --config");
            std::process::exit(2);
        }
    };

    let world = World::new(Maze::demo(opts.spacing), opts.max_seconds);
    let hw = Hardware::new(
        SimMotors(world.clone()),
        SimGyro(world.clone()),
        SimLineSensors(world.clone()),
        SimClock(world.clone()),
        SimDelay(world.clone()),
    );
    let robot = GridRobot::new(hw, config);

    let executor = gridnav_core::mk_static!(Executor, Executor::new());
    executor.run(|spawner| {
        spawner.spawn(nav_task(robot, opts.operator_polls)).unwrap();
        spawner.spawn(policy_task(world)).unwrap();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_hand_rule_prefers_left() {
        let report = IntersectionReport {
            found_left: true,
            found_straight: true,
            found_right: true,
        };
        assert_eq!(select_turn(&report), TurnDirection::Left);
        assert_eq!(
            select_turn(&IntersectionReport::default()),
            TurnDirection::Back
        );
    }

    #[test]
    fn dead_end_detours_are_simplified() {
        let mut path = Vec::new();
        for c in "LLBS".chars() {
            path.push(TurnDirection::from_char(c).unwrap());
            simplify(&mut path);
        }
        // L + B + S = 450 degrees, a right turn.
        assert_eq!(letters(&path), "LR");
    }
}
