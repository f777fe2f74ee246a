//! Fixed-point yaw integration from raw gyro samples.
//!
//! Heading is kept in units where 2^29 is 45 degrees (so 2^32 is a full turn),
//! accumulated in an `i64` so repeated turns never wrap. Integration is plain
//! Euler: the error grows with the time between updates, so callers update
//! inside every loop that spans a rotation.
//!
//! # Example
//! ```rust
//! use gridnav_core::utils::math::heading::{HeadingTracker, GyroScale, ANGLE_45};
//! let mut heading = HeadingTracker::new(GyroScale::MDPS_70);
//! heading.reset(0);
//! heading.update(1000, 10_000);
//! assert!(heading.angle() > 0 && heading.angle() < ANGLE_45);
//! ```

use serde::{Deserialize, Serialize};

use crate::utils::controllers::driver::{Gyro, NavError};

/// 45 degrees in heading units.
pub const ANGLE_45: i64 = 1 << 29;
/// 90 degrees in heading units.
pub const ANGLE_90: i64 = ANGLE_45 * 2;

/// Rational conversion from (raw gyro units × µs) to heading units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GyroScale {
    pub num: i64,
    pub den: i64,
}

impl GyroScale {
    /// 70 mdps per digit (±2000 dps full scale).
    ///
    /// (70 mdps/digit) × (1/1000 dps/mdps) × (1/10^6 s/µs) × (2^29/45 unit/degree)
    /// = 14680064/17578125 unit/µs/digit
    pub const MDPS_70: GyroScale = GyroScale {
        num: 14_680_064,
        den: 17_578_125,
    };

    /// Scale for a gyro reporting `mdps_per_digit` milli-degrees per second per digit.
    ///
    /// The ratio is reduced so `update` cannot overflow for 16-bit samples and intervals.
    pub const fn from_mdps_per_digit(mdps_per_digit: i64) -> Self {
        let num = mdps_per_digit * (1 << 29);
        let den = 45_000_000_000;
        let divisor = gcd(num, den);
        GyroScale {
            num: num / divisor,
            den: den / divisor,
        }
    }
}

const fn gcd(
    mut a: i64,
    mut b: i64,
) -> i64 {
    if a < 0 {
        a = -a;
    }
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

/// Running heading estimate since the last [`HeadingTracker::reset`].
#[derive(Debug, Clone)]
pub struct HeadingTracker {
    angle: i64,
    bias: i16,
    last_update: u16,
    scale: GyroScale,
}

impl HeadingTracker {
    pub fn new(scale: GyroScale) -> Self {
        Self {
            angle: 0,
            bias: 0,
            last_update: 0,
            scale,
        }
    }

    /// Zero the heading and start timing from `now` (µs, wrapping).
    pub fn reset(
        &mut self,
        now: u16,
    ) {
        self.last_update = now;
        self.angle = 0;
    }

    /// Integrate one raw sample taken at `now`.
    ///
    /// Elapsed time is the wrapping difference to the previous call, so calls must
    /// come less than 65.5 ms apart.
    pub fn update(
        &mut self,
        sample: i16,
        now: u16,
    ) {
        let dt = now.wrapping_sub(self.last_update);
        self.last_update = now;

        let rate = i64::from(sample) - i64::from(self.bias);
        self.angle += rate * i64::from(dt) * self.scale.num / self.scale.den;
    }

    /// Accumulated heading; positive is counter-clockwise (left).
    pub fn angle(&self) -> i64 {
        self.angle
    }

    /// Heading in whole degrees.
    pub fn degrees(&self) -> i32 {
        (((self.angle >> 16) * 360) >> 16) as i32
    }

    pub fn bias(&self) -> i16 {
        self.bias
    }

    pub fn set_bias(
        &mut self,
        bias: i16,
    ) {
        self.bias = bias;
    }

    /// Average `sample_count` fresh samples and store the mean as the bias.
    ///
    /// The robot must be stationary. Sums fit in `i32` for any `u16` count.
    pub fn calibrate_bias<G: Gyro>(
        &mut self,
        gyro: &mut G,
        sample_count: u16,
    ) -> Result<i16, NavError> {
        if sample_count == 0 {
            return Ok(self.bias);
        }

        let mut total: i32 = 0;
        for _ in 0..sample_count {
            while !gyro.sample_ready().map_err(NavError::gyro)? {}
            total += i32::from(gyro.read_angular_rate().map_err(NavError::gyro)?);
        }
        self.bias = (total / i32::from(sample_count)) as i16;

        tracing::info!(bias = self.bias, samples = sample_count, "gyro bias calibrated");
        Ok(self.bias)
    }
}
