// src/hal.rs

//! # Hardware Abstraction
//!
//! The flight core never touches peripheral registers. Boards implement
//! these traits on top of their SPI, PWM, radio and timer drivers.

use core::fmt::Debug;

use crate::estimator::RawImuSample;
use crate::link::PeerId;
use crate::time::Instant;

/// Inertial measurement unit producing gyro and accelerometer samples.
pub trait ImuSensor {
    /// Driver error.
    type Error: Debug;

    /// Configures the sensor. Failure is fatal.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Non-blocking poll for a new sample.
    fn data_ready(&mut self) -> bool;

    /// Latest sample in sensor axes: gyro in degrees per second,
    /// accelerometer in g.
    fn read_sample(&mut self) -> RawImuSample;
}

/// Motor outputs.
pub trait Actuator {
    /// Driver error.
    type Error: Debug;

    /// Configures the outputs. Failure is fatal.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Sets the duty of one channel, `duty` in `[0, 1]`.
    fn set_duty(&mut self, channel: usize, duty: f32);
}

/// Outbound side of the wireless link.
pub trait Transport {
    /// Driver error.
    type Error: Debug;

    /// Brings the radio up and registers the peer. Failure is fatal.
    fn init(&mut self, peer: &PeerId) -> Result<(), Self::Error>;

    /// Sends one datagram to `peer`. Fire and forget.
    fn send(&mut self, peer: &PeerId, payload: &[u8]) -> Result<(), Self::Error>;
}

/// Monotonic time source.
pub trait Clock {
    /// Current time.
    fn now(&mut self) -> Instant;
}

/// Board level services used by the fatal error path.
pub trait Platform {
    /// Blocks for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Restarts the device.
    fn restart(&mut self) -> !;
}
