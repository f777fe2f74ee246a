//! I2C board adapters.
//!
//! A PCA9685 PWM expander drives two phase/enable H-bridge channels for the
//! wheels, and an ICM-42670 supplies the yaw rate. Both share one bus through
//! `RefCellDevice`.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use icm42670::{Address as ImuAddress, Error as ImuError, Icm42670, PowerMode};
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use crate::utils::controllers::driver::{DriveMotors, Gyro};

/// Default I2C address of the PWM motor controller.
pub const PWM_ADDRESS: u8 = 0x55;
/// Prescale for roughly 1.5 kHz motor PWM.
pub const PWM_PRESCALE: u8 = 3;
/// Full-scale PCA9685 duty.
const MAX_DUTY: u16 = 4095;

/// Errors that can occur when talking to the I2C devices.
#[derive(Debug)]
pub enum DeviceError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
    ImuError(ImuError<E>),
}

/// Two-wheel drive through a PCA9685.
///
/// Each wheel uses a (phase, enable) channel pair: phase selects the direction,
/// enable carries the duty.
pub struct PwmDrive<'a, I2C: 'static> {
    pwm: Pca9685<RefCellDevice<'a, I2C>>,
    motor_channels: [(Channel, Channel); 2],
    flipped: [bool; 2],
    max_speed: i16,
}

impl<'a, I2C, E> PwmDrive<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Attach to the controller at [`PWM_ADDRESS`]. Speeds are scaled so `max_speed` is full duty.
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        max_speed: i16,
    ) -> Result<Self, DeviceError<E>> {
        let pwm = Pca9685::new(RefCellDevice::new(i2c_bus), PwmAddress::from(PWM_ADDRESS))
            .map_err(DeviceError::PwmError)?;
        Ok(PwmDrive {
            pwm,
            motor_channels: [(Channel::C0, Channel::C1), (Channel::C2, Channel::C3)],
            flipped: [false, false],
            max_speed: max_speed.max(1),
        })
    }

    /// Reverse the direction of either wheel to match its wiring.
    pub fn flip(
        mut self,
        left: bool,
        right: bool,
    ) -> Self {
        self.flipped = [left, right];
        self
    }

    /// Wake the controller and set the PWM frequency.
    pub fn configure(&mut self) -> Result<(), DeviceError<E>> {
        self.pwm.enable().map_err(DeviceError::PwmError)?;
        self.pwm
            .set_prescale(PWM_PRESCALE)
            .map_err(DeviceError::PwmError)?;
        tracing::info!(prescale = PWM_PRESCALE, "motor PWM configured");
        Ok(())
    }

    /// Put the controller to sleep; the wheels coast.
    pub fn disable(&mut self) -> Result<(), DeviceError<E>> {
        self.pwm.disable().map_err(DeviceError::PwmError)
    }

    fn duty(
        &self,
        speed: i16,
    ) -> u16 {
        let magnitude = u32::from(speed.unsigned_abs().min(self.max_speed as u16));
        (magnitude * u32::from(MAX_DUTY) / self.max_speed as u32) as u16
    }
}

impl<'a, I2C, E> DriveMotors for PwmDrive<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    type Error = DeviceError<E>;

    fn set_speeds(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error> {
        for (i, speed) in [left, right].into_iter().enumerate() {
            let (phase_channel, enable_channel) = self.motor_channels[i];
            let forward = (speed >= 0) != self.flipped[i];
            let duty = self.duty(speed);

            self.pwm
                .set_channel_on_off(phase_channel, 0, if forward { 0 } else { MAX_DUTY })
                .map_err(DeviceError::PwmError)?;
            self.pwm
                .set_channel_on_off(enable_channel, 0, duty)
                .map_err(DeviceError::PwmError)?;
        }
        Ok(())
    }
}

/// Yaw rate from an ICM-42670, reported in fixed raw units.
///
/// The driver returns degrees per second; samples are converted to
/// `mdps_per_digit` units so the heading scale stays a fixed integer ratio.
pub struct ImuGyro<'a, I2C: 'static> {
    imu: Icm42670<RefCellDevice<'a, I2C>>,
    mdps_per_digit: f32,
}

impl<'a, I2C, E> ImuGyro<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Attach to the IMU at its primary address, using 70 mdps per raw unit.
    pub fn new(i2c_bus: &'a RefCell<I2C>) -> Result<Self, DeviceError<E>> {
        let imu = Icm42670::new(RefCellDevice::new(i2c_bus), ImuAddress::Primary)
            .map_err(DeviceError::ImuError)?;
        Ok(ImuGyro {
            imu,
            mdps_per_digit: 70.0,
        })
    }

    /// Raw-unit resolution in milli-degrees per second. Must match the heading scale.
    pub fn with_resolution(
        mut self,
        mdps_per_digit: f32,
    ) -> Self {
        self.mdps_per_digit = mdps_per_digit;
        self
    }

    /// Power the gyro up for sampling.
    pub fn enable(&mut self) -> Result<(), DeviceError<E>> {
        self.imu
            .set_power_mode(PowerMode::SixAxisLowNoise)
            .map_err(DeviceError::ImuError)
    }

    /// Put the IMU to sleep.
    pub fn disable(&mut self) -> Result<(), DeviceError<E>> {
        self.imu
            .set_power_mode(PowerMode::Sleep)
            .map_err(DeviceError::ImuError)
    }
}

impl<'a, I2C, E> Gyro for ImuGyro<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    type Error = DeviceError<E>;

    fn read_angular_rate(&mut self) -> Result<i16, Self::Error> {
        let gyro = self.imu.gyro_norm().map_err(DeviceError::ImuError)?;
        // Float-to-int `as` saturates at the i16 limits.
        Ok((gyro.z * 1000.0 / self.mdps_per_digit) as i16)
    }
}
