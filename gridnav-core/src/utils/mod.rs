//! Utility re-exports and helper macros for grid navigation.
//!
//! - `config`: tuning constants for speeds, thresholds and timing
//! - `controllers`: hardware seams, board adapters and the command loop
//! - `math`: fixed-point gyro heading integration
//! - `motion`: segment following, turns, intersection probing and calibration
//! - `sensors`: calibrated line-sensor front end
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod math;
pub mod motion;
pub mod sensors;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GridConfig;
pub use controllers::{GridRobot, NAV_CHANNEL, NAV_EVENTS};
pub use math::heading::HeadingTracker;
pub use motion::{IntersectionReport, SegmentEnd, TurnDirection};
pub use sensors::line::{LineSensorFrontEnd, SensorFrame};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
