//! Sensor front ends.
//!
//! - `line`: calibrated reflectance readings, line position and threshold checks

pub mod line;
