//! Tuning constants for grid navigation.
//!
//! Every value has a default matching a small tracked robot running on
//! electrical-tape lines; override individual fields when a board or surface
//! needs it. Values can also be deserialized from JSON, missing fields falling
//! back to their defaults.

use serde::{Deserialize, Serialize};

use crate::utils::math::heading::GyroScale;

/// Speeds, thresholds and timing used by every motion primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Base wheel speed while following a segment or centering on an intersection.
    pub straight_speed: i16,
    /// Wheel speed (opposite signs) while turning in place.
    pub turn_speed: i16,
    /// Wheel speed while sweeping over the line during calibration.
    pub calibration_speed: i16,
    /// Largest magnitude ever sent to the drive.
    pub max_speed: i16,
    /// Line-position error is divided by this to get the wheel speed difference.
    pub follow_divisor: i16,
    /// Calibrated reading (0..=1000) above which a sensor sees the line.
    pub line_threshold: u16,
    /// Calibrated reading above which a sensor sees a solid dark marker.
    pub dark_threshold: u16,
    /// Time to drive from intersection entry to its center.
    pub intersection_delay_ms: u32,
    /// Stationary gyro samples averaged for the bias estimate.
    pub gyro_bias_samples: u16,
    /// Pause before gyro calibration so the robot is not touched.
    pub gyro_settle_ms: u32,
    /// Pause before the line-calibration sweep, after the confirm press.
    pub line_settle_ms: u32,
    /// Conversion from raw gyro units times microseconds to heading units.
    pub gyro_scale: GyroScale,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            straight_speed: 200,
            turn_speed: 200,
            calibration_speed: 200,
            max_speed: 400,
            follow_divisor: 4,
            line_threshold: 200,
            dark_threshold: 600,
            intersection_delay_ms: 130,
            gyro_bias_samples: 1024,
            gyro_settle_ms: 500,
            line_settle_ms: 1000,
            gyro_scale: GyroScale::MDPS_70,
        }
    }
}

impl GridConfig {
    /// Return a copy with every speed limited to `0..=max_speed`, a positive divisor
    /// and a usable gyro scale.
    pub fn normalized(self) -> Self {
        let max = self.max_speed.max(0);
        Self {
            straight_speed: self.straight_speed.clamp(0, max),
            turn_speed: self.turn_speed.clamp(0, max),
            calibration_speed: self.calibration_speed.clamp(0, max),
            max_speed: max,
            follow_divisor: self.follow_divisor.max(1),
            gyro_scale: if self.gyro_scale.den <= 0 || self.gyro_scale.num < 0 {
                GyroScale::MDPS_70
            } else {
                self.gyro_scale
            },
            ..self
        }
    }
}
