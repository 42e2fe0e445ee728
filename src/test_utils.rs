// src/test_utils.rs

//! This module contains utilities and host mocks for testing.

use core::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use nalgebra::Vector3;

use crate::estimator::RawImuSample;
use crate::hal::{Actuator, Clock, ImuSensor, Platform, Transport};
use crate::link::{PeerId, SETPOINT_PACKET_LEN};
use crate::settings::{Storage, SETTINGS_CAPACITY};
use crate::time::Instant;

/// A constant defining the tolerance within which floating-point values
/// are considered close enough to be equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

/// Checks if two floating point numbers are close enough to be considered
/// equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` is less than
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_close(target: f32, value: f32) -> bool {
    (target - value).abs() < TEST_TOLERANCE
}

/// Checks if each of the components in a vector is close enough to
/// be considered equal.
///
/// # Arguments
/// * `target` - The target vector.
/// * `value` - The vector to compare against the target.
///
/// # Returns
/// `true` if each component of `target` and `value` is close as per `value_close`,
/// otherwise `false`.
pub fn vector_close(target: Vector3<f32>, value: Vector3<f32>) -> bool {
    value_close(target.x, value.x)
        && value_close(target.y, value.y)
        && value_close(target.z, value.z)
}

/// Checks if each of four motor duties is close enough to be considered
/// equal.
pub fn duties_close(target: [f32; 4], value: [f32; 4]) -> bool {
    target
        .iter()
        .zip(value.iter())
        .all(|(target, value)| value_close(*target, *value))
}

#[derive(Debug)]
struct ImuState {
    sample: RawImuSample,
    ready: bool,
    fail_init: bool,
    polls: u32,
    reads: u32,
}

/// Scripted IMU. Clones share state so a test can steer the sensor after
/// handing it over.
#[derive(Debug, Clone)]
pub struct MockImu {
    state: Rc<RefCell<ImuState>>,
}

impl MockImu {
    /// A level sensor at rest, always ready.
    pub fn level() -> Self {
        Self {
            state: Rc::new(RefCell::new(ImuState {
                sample: RawImuSample {
                    gyro: Vector3::zeros(),
                    accel: Vector3::new(0.0, 0.0, 1.0),
                },
                ready: true,
                fail_init: false,
                polls: 0,
                reads: 0,
            })),
        }
    }

    /// Sets the raw gyro reading in sensor axes.
    pub fn set_gyro(&self, gyro: Vector3<f32>) {
        self.state.borrow_mut().sample.gyro = gyro;
    }

    /// Sets the raw accelerometer reading in sensor axes.
    pub fn set_accel(&self, accel: Vector3<f32>) {
        self.state.borrow_mut().sample.accel = accel;
    }

    /// Sets the data ready flag.
    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Makes `init` fail.
    pub fn fail_init(&self) {
        self.state.borrow_mut().fail_init = true;
    }

    /// Current raw sample.
    pub fn sample(&self) -> RawImuSample {
        self.state.borrow().sample
    }

    /// Number of data ready polls.
    pub fn polls(&self) -> u32 {
        self.state.borrow().polls
    }

    /// Number of samples read.
    pub fn reads(&self) -> u32 {
        self.state.borrow().reads
    }
}

impl ImuSensor for MockImu {
    type Error = &'static str;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.state.borrow().fail_init {
            Err("imu offline")
        } else {
            Ok(())
        }
    }

    fn data_ready(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        state.ready
    }

    fn read_sample(&mut self) -> RawImuSample {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        state.sample
    }
}

/// Motor outputs recording the last duty per channel.
#[derive(Debug, Clone, Default)]
pub struct MockMotors {
    duties: Rc<RefCell<[f32; 4]>>,
    writes: Rc<Cell<u32>>,
    fail_init: Rc<Cell<bool>>,
}

impl MockMotors {
    /// Last duties written.
    pub fn duties(&self) -> [f32; 4] {
        *self.duties.borrow()
    }

    /// Number of `set_duty` calls.
    pub fn writes(&self) -> u32 {
        self.writes.get()
    }

    /// Makes `init` fail.
    pub fn fail_init(&self) {
        self.fail_init.set(true);
    }
}

impl Actuator for MockMotors {
    type Error = &'static str;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init.get() {
            Err("pwm offline")
        } else {
            Ok(())
        }
    }

    fn set_duty(&mut self, channel: usize, duty: f32) {
        self.duties.borrow_mut()[channel] = duty;
        self.writes.set(self.writes.get() + 1);
    }
}

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Moves time forward.
    pub fn advance_ms(&self, ms: u64) {
        self.micros.set(self.micros.get() + ms * 1_000);
    }

    /// Current time.
    pub fn instant(&self) -> Instant {
        Instant::from_ticks(self.micros.get())
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Instant {
        self.instant()
    }
}

/// Key value storage in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    read_only: bool,
}

impl MemoryStorage {
    /// A storage that refuses every write.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Raw bytes under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    /// Stores raw bytes under `key`.
    pub fn insert_raw(&self, key: &str, bytes: &[u8]) {
        self.entries.borrow_mut().insert(key.to_string(), bytes.to_vec());
    }
}

impl Storage for MemoryStorage {
    fn load(&mut self, key: &str) -> Option<heapless::Vec<u8, SETTINGS_CAPACITY>> {
        let entries = self.entries.borrow();
        let bytes = entries.get(key)?;
        heapless::Vec::from_slice(bytes).ok()
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> bool {
        if self.read_only {
            return false;
        }
        self.insert_raw(key, bytes);
        true
    }
}

/// Transport recording every datagram sent.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Rc<RefCell<Vec<(PeerId, Vec<u8>)>>>,
    fail_init: Rc<Cell<bool>>,
}

impl MockTransport {
    /// Datagrams sent so far.
    pub fn sent(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.sent.borrow().clone()
    }

    /// Makes `init` fail.
    pub fn fail_init(&self) {
        self.fail_init.set(true);
    }
}

impl Transport for MockTransport {
    type Error = &'static str;

    fn init(&mut self, _peer: &PeerId) -> Result<(), Self::Error> {
        if self.fail_init.get() {
            Err("radio offline")
        } else {
            Ok(())
        }
    }

    fn send(&mut self, peer: &PeerId, payload: &[u8]) -> Result<(), Self::Error> {
        self.sent.borrow_mut().push((*peer, payload.to_vec()));
        Ok(())
    }
}

/// Platform that records delays and panics on restart.
#[derive(Debug, Default)]
pub struct MockPlatform {
    /// Total milliseconds waited.
    pub delayed_ms: u32,
}

impl Platform for MockPlatform {
    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += ms;
    }

    fn restart(&mut self) -> ! {
        panic!("restart after {} ms", self.delayed_ms)
    }
}

/// Encodes a setpoint datagram the way the remote does.
pub fn setpoint_packet(
    left_x: f32,
    left_y: f32,
    right_x: f32,
    right_y: f32,
    armed: bool,
) -> [u8; SETPOINT_PACKET_LEN] {
    let mut packet = [0u8; SETPOINT_PACKET_LEN];
    for (index, value) in [left_x, left_y, right_x, right_y].iter().enumerate() {
        packet[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    packet[16] = armed as u8;
    packet
}
