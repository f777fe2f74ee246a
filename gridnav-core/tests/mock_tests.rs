use core::cell::RefCell;

use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use gridnav_core::utils::controllers::{
    driver::DriveMotors,
    i2c::{ImuGyro, PwmDrive, PWM_ADDRESS},
};

/// Default I2C address for the IMU sensor.
pub const IMU_ADDRESS: u8 = 0x68;

/// Create a write transaction for the given I2C address and data payload.
pub fn write(
    addr: u8,
    data: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write(addr, data)
}
/// Create a write_read transaction for the given I2C address/payloads.
pub fn write_read(
    addr: u8,
    write: Vec<u8>,
    read: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write_read(addr, write, read)
}

/// Auto-increment enable, written before the first channel update.
fn auto_increment() -> I2cTrans {
    write(PWM_ADDRESS, vec![0x00, 0x31])
}

/// Channel `n` on/off registers with ON = 0.
fn channel(
    n: u8,
    off: u16,
) -> I2cTrans {
    let [lo, hi] = off.to_le_bytes();
    write(PWM_ADDRESS, vec![0x06 + 4 * n, 0x00, 0x00, lo, hi])
}

#[test]
fn test_imu_gyro_init() {
    let expectations = [
        write_read(IMU_ADDRESS, vec![0x75], vec![0x67]),
        write_read(IMU_ADDRESS, vec![0x21], vec![0x00]),
        write(IMU_ADDRESS, vec![0x21, 0x00]),
        write_read(IMU_ADDRESS, vec![0x20], vec![0x00]),
        write(IMU_ADDRESS, vec![0x20, 0x00]),
        write_read(IMU_ADDRESS, vec![0x1F], vec![0x0F]),
        write(IMU_ADDRESS, vec![0x1F, 0x0F]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let gyro = ImuGyro::new(&i2c_bus);
    assert!(gyro.is_ok());
    drop(gyro);
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_configure_pwm() {
    // Enable, then prescale with the sleep bit set around it.
    let expectations = [
        write(PWM_ADDRESS, vec![0x00, 0x01]),
        write(PWM_ADDRESS, vec![0x00, 0x11]),
        write(PWM_ADDRESS, vec![0xFE, 0x03]),
        write(PWM_ADDRESS, vec![0x00, 0x01]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut drive = PwmDrive::new(&i2c_bus, 400).unwrap();
    drive.configure().unwrap();
    drop(drive);
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_set_speeds_zero() {
    let expectations = [
        auto_increment(),
        channel(0, 0),
        channel(1, 0),
        channel(2, 0),
        channel(3, 0),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut drive = PwmDrive::new(&i2c_bus, 400).unwrap();
    drive.set_speeds(0, 0).unwrap();
    drop(drive);
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_set_speeds_direction_and_duty() {
    let expectations = [
        auto_increment(),
        // Left forward at half speed.
        channel(0, 0),
        channel(1, 2047),
        // Right reverse at full speed.
        channel(2, 4095),
        channel(3, 4095),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut drive = PwmDrive::new(&i2c_bus, 400).unwrap();
    drive.set_speeds(200, -400).unwrap();
    drop(drive);
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_set_speeds_flipped_and_saturated() {
    let expectations = [
        auto_increment(),
        // Flipped left wheel: forward command drives the reverse phase.
        channel(0, 4095),
        channel(1, 4095),
        channel(2, 0),
        channel(3, 0),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut drive = PwmDrive::new(&i2c_bus, 400).unwrap().flip(true, false);
    drive.set_speeds(900, 0).unwrap();
    drop(drive);
    i2c_bus.borrow_mut().done();
}
