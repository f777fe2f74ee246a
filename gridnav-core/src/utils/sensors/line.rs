//! Calibrated line-sensor readings.
//!
//! Raw reflectance values are rescaled per sensor into 0..=1000 using the
//! range seen during calibration, and a weighted centroid gives the lateral
//! line position: 0 under the leftmost sensor, 1000 per sensor step, so the
//! middle of a five-sensor array is 2000.

use crate::utils::controllers::driver::{LineSensorArray, NavError};

/// Number of reflectance sensors in the array.
pub const SENSOR_COUNT: usize = 5;
/// Full-scale calibrated reading.
pub const CALIBRATED_MAX: u16 = 1000;
/// Line position under the middle sensor; the follower's set point.
pub const CENTER_POSITION: u16 = (SENSOR_COUNT as u16 - 1) * CALIBRATED_MAX / 2;
/// Line position under the rightmost sensor.
pub const MAX_POSITION: u16 = (SENSOR_COUNT as u16 - 1) * CALIBRATED_MAX;

/// Readings at or below this are treated as noise by the centroid.
const NOISE_FLOOR: u16 = 50;
/// A frame with no reading above this has lost the line.
const ON_LINE: u16 = 200;
/// Raw reads taken per `calibrate` call.
const CALIBRATION_READS: usize = 10;

/// Sensor indices checked for a dark marker (all but the two outermost).
const INTERIOR: [usize; SENSOR_COUNT - 2] = [1, 2, 3];

/// Which threshold [`LineSensorFrontEnd::is_above_threshold`] compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// Ordinary line edge.
    Line,
    /// Solid printed marker.
    Dark,
}

/// Observed raw range of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRange {
    pub min: u16,
    pub max: u16,
}

impl CalibrationRange {
    /// Nothing observed yet; every reading maps to 0.
    pub const UNSET: CalibrationRange = CalibrationRange {
        min: u16::MAX,
        max: 0,
    };

    pub const fn new(
        min: u16,
        max: u16,
    ) -> Self {
        Self { min, max }
    }

    /// Linear rescale into 0..=1000, clamped. Degenerate ranges read 0.
    pub fn scale(
        &self,
        raw: u16,
    ) -> u16 {
        if self.max <= self.min {
            return 0;
        }
        let span = i32::from(self.max - self.min);
        let x = (i32::from(raw) - i32::from(self.min)) * i32::from(CALIBRATED_MAX) / span;
        x.clamp(0, i32::from(CALIBRATED_MAX)) as u16
    }
}

impl Default for CalibrationRange {
    fn default() -> Self {
        Self::UNSET
    }
}

/// One control cycle's calibrated readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    /// Calibrated intensities, left to right.
    pub values: [u16; SENSOR_COUNT],
    /// Weighted centroid, 0..=`MAX_POSITION`.
    pub position: u16,
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self {
            values: [0; SENSOR_COUNT],
            position: CENTER_POSITION,
        }
    }
}

impl SensorFrame {
    /// Bar heights 0..=8 for the calibration display.
    pub fn bar_levels(&self) -> [u8; SENSOR_COUNT] {
        let mut levels = [0u8; SENSOR_COUNT];
        for (level, &value) in levels.iter_mut().zip(self.values.iter()) {
            *level = (u32::from(value.min(CALIBRATED_MAX)) * 8 / u32::from(CALIBRATED_MAX)) as u8;
        }
        levels
    }
}

/// Owns per-sensor calibration and the most recent frame.
///
/// Threshold queries refer to the last frame produced by [`read_frame`](Self::read_frame),
/// so read first in each control cycle.
#[derive(Debug, Clone)]
pub struct LineSensorFrontEnd {
    calibration: [CalibrationRange; SENSOR_COUNT],
    frame: SensorFrame,
    last_position: u16,
    line_threshold: u16,
    dark_threshold: u16,
}

impl LineSensorFrontEnd {
    pub fn new(
        line_threshold: u16,
        dark_threshold: u16,
    ) -> Self {
        Self {
            calibration: [CalibrationRange::UNSET; SENSOR_COUNT],
            frame: SensorFrame::default(),
            last_position: 0,
            line_threshold,
            dark_threshold,
        }
    }

    /// Widen each sensor's range from a burst of raw reads.
    ///
    /// Within the burst the minimum of the maxima and maximum of the minima are
    /// used, so a single noisy read cannot stretch the range.
    pub fn calibrate<S: LineSensorArray>(
        &mut self,
        sensors: &mut S,
    ) -> Result<(), NavError> {
        let mut burst_max = [0u16; SENSOR_COUNT];
        let mut burst_min = [u16::MAX; SENSOR_COUNT];

        for _ in 0..CALIBRATION_READS {
            let raw = sensors.read_raw().map_err(NavError::line_sensors)?;
            for i in 0..SENSOR_COUNT {
                burst_max[i] = burst_max[i].max(raw[i]);
                burst_min[i] = burst_min[i].min(raw[i]);
            }
        }

        for (i, range) in self.calibration.iter_mut().enumerate() {
            if burst_min[i] > range.max {
                range.max = burst_min[i];
            }
            if burst_max[i] < range.min {
                range.min = burst_max[i];
            }
        }
        Ok(())
    }

    /// Read the array and produce a calibrated frame.
    pub fn read_frame<S: LineSensorArray>(
        &mut self,
        sensors: &mut S,
    ) -> Result<SensorFrame, NavError> {
        let raw = sensors.read_raw().map_err(NavError::line_sensors)?;
        Ok(self.frame_from_raw(&raw))
    }

    /// Calibrate `raw` and compute the line position, remembering the frame.
    ///
    /// With no sensor on the line the position snaps to whichever end the line
    /// was last seen nearer to.
    pub fn frame_from_raw(
        &mut self,
        raw: &[u16; SENSOR_COUNT],
    ) -> SensorFrame {
        let mut values = [0u16; SENSOR_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.calibration[i].scale(raw[i]);
        }

        let mut weighted: u32 = 0;
        let mut total: u32 = 0;
        let mut on_line = false;
        for (i, &value) in values.iter().enumerate() {
            if value > ON_LINE {
                on_line = true;
            }
            if value > NOISE_FLOOR {
                weighted += u32::from(value) * (i as u32) * u32::from(CALIBRATED_MAX);
                total += u32::from(value);
            }
        }

        let position = if on_line && total > 0 {
            let centroid = (weighted / total) as u16;
            self.last_position = centroid;
            centroid
        } else if self.last_position < CENTER_POSITION {
            0
        } else {
            MAX_POSITION
        };

        self.frame = SensorFrame { values, position };
        self.frame
    }

    /// Whether sensor `index` read above the chosen threshold in the last frame.
    pub fn is_above_threshold(
        &self,
        index: usize,
        kind: ThresholdKind,
    ) -> bool {
        let threshold = match kind {
            ThresholdKind::Line => self.line_threshold,
            ThresholdKind::Dark => self.dark_threshold,
        };
        self.frame.values.get(index).is_some_and(|&v| v > threshold)
    }

    /// Whether every interior sensor sees a solid dark marker.
    pub fn is_over_dark_spot(&self) -> bool {
        INTERIOR.iter().all(|&i| self.is_above_threshold(i, ThresholdKind::Dark))
    }

    /// Whether any sensor in `indices` is above the line threshold.
    pub fn any_on_line(
        &self,
        mut indices: core::ops::Range<usize>,
    ) -> bool {
        indices.any(|i| self.is_above_threshold(i, ThresholdKind::Line))
    }

    /// Whether either outermost sensor sees a line.
    pub fn outer_on_line(&self) -> bool {
        self.is_above_threshold(0, ThresholdKind::Line)
            || self.is_above_threshold(SENSOR_COUNT - 1, ThresholdKind::Line)
    }

    pub fn last_frame(&self) -> &SensorFrame {
        &self.frame
    }

    pub fn calibration(&self) -> &[CalibrationRange; SENSOR_COUNT] {
        &self.calibration
    }

    pub fn set_calibration(
        &mut self,
        calibration: [CalibrationRange; SENSOR_COUNT],
    ) {
        self.calibration = calibration;
    }

    /// Forget all observed ranges before a fresh calibration.
    pub fn reset_calibration(&mut self) {
        self.calibration = [CalibrationRange::UNSET; SENSOR_COUNT];
    }
}
