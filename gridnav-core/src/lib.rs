//! Line-grid navigation for small differential-drive robots on no-std embedded platforms.
//!
//! The robot follows black lines on a white surface, stops at intersections and
//! dead ends, turns with a gyro plus line-sensor landing, and reports which exits an
//! intersection has. See `gridnav-app/mock-mcu` for a simulated run.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod utils;
