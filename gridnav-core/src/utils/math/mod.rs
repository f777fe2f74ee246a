//! Math utilities for grid navigation.
//!
//! This module provides fixed-point heading integration for gyro-assisted turns.

pub mod heading;
