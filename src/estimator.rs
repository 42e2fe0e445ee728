// src/estimator.rs

//! # Attitude Estimator
//!
//! Turns raw IMU samples into roll, pitch and yaw angles, body rates and
//! linear acceleration in the body fixed FLU frame (x Forward, y Left,
//! z Up).
//!
//! Roll and pitch fuse the integrated gyro rate with the tilt observed by
//! the accelerometer through a complementary filter. Yaw has no absolute
//! reference and is the plain integral of the yaw rate, so it drifts
//! without bound. Every angle is wrapped to `(-π, π]`.
//!
//! The accelerometer vector is reported pointing along gravity, a level
//! vehicle at rest reads `(0, 0, -1)`, which gives
//! `roll = atan2(-a.y, -a.z)` and `pitch = atan2(a.x, hypot(a.y, a.z))`.

pub mod calibration;

use core::f32::consts::{PI, TAU};

use log::{debug, info, warn};
use nalgebra::Vector3;
#[allow(unused_imports)]
use num_traits::Float;

use crate::error::{Error, Peripheral};
use crate::filter::{ComplementaryFilter, LowPassFilter};
use crate::hal::ImuSensor;
use calibration::{
    AccelCalibrationSession, AccelCalibrationStep, CalibrationError, CalibrationParameters,
    GyroBiasAccumulator, SAMPLES_PER_ORIENTATION,
};

const DEG_TO_RAD: f32 = PI / 180.0;

/// One gyro and accelerometer reading in sensor axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawImuSample {
    /// Angular rate in degrees per second.
    pub gyro: Vector3<f32>,
    /// Specific force in g.
    pub accel: Vector3<f32>,
}

/// Filtered attitude in the FLU body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimate {
    /// Roll, pitch and yaw in radians, each within `(-π, π]`.
    pub orientation: Vector3<f32>,
    /// Roll, pitch and yaw rates in radians per second.
    pub angular_velocity: Vector3<f32>,
    /// Acceleration along forward, left and up in g.
    pub linear_acceleration: Vector3<f32>,
}

impl OrientationEstimate {
    /// Level and at rest.
    pub fn level() -> Self {
        Self {
            orientation: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            linear_acceleration: Vector3::new(0.0, 0.0, -1.0),
        }
    }

    /// Rotation about the forward axis, radians.
    pub fn roll(&self) -> f32 {
        self.orientation.x
    }

    /// Rotation about the left axis, radians.
    pub fn pitch(&self) -> f32 {
        self.orientation.y
    }

    /// Rotation about the up axis, radians.
    pub fn yaw(&self) -> f32 {
        self.orientation.z
    }

    /// Roll rate, radians per second.
    pub fn roll_rate(&self) -> f32 {
        self.angular_velocity.x
    }

    /// Pitch rate, radians per second.
    pub fn pitch_rate(&self) -> f32 {
        self.angular_velocity.y
    }

    /// Yaw rate, radians per second.
    pub fn yaw_rate(&self) -> f32 {
        self.angular_velocity.z
    }
}

/// Wraps an angle in radians to `(-π, π]`.
///
/// Angles already inside the interval are returned unchanged, which makes
/// the function idempotent. NaN stays NaN.
pub fn normalize_angle(angle: f32) -> f32 {
    if angle > -PI && angle <= PI {
        return angle;
    }

    let mut wrapped = (angle + PI) % TAU;
    if wrapped <= 0.0 {
        wrapped += TAU;
    }
    let normalized = wrapped - PI;
    if normalized <= -PI {
        PI
    } else {
        normalized
    }
}

/// Rotates a vector from sensor axes into the FLU body frame.
///
/// The sensor is mounted with its x axis pointing right and its y axis
/// pointing forward.
pub fn sensor_to_flu(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.y, -v.x, v.z)
}

/// Tuning of the attitude estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Input weight of the gyro low-pass filter.
    pub gyro_filter_alpha: f32,
    /// Input weight of the accelerometer low-pass filter.
    pub accel_filter_alpha: f32,
    /// Gyro weight of the roll and pitch complementary filters.
    pub complementary_alpha: f32,
    /// Data ready polls before the latest sample is used anyway.
    pub ready_poll_limit: u32,
    /// Samples per orientation of the accelerometer sweep.
    pub accel_samples_per_orientation: u32,
}

impl EstimatorConfig {
    /// Reference tuning.
    pub const fn new() -> Self {
        Self {
            gyro_filter_alpha: 0.35,
            accel_filter_alpha: 0.2,
            complementary_alpha: 0.98,
            ready_poll_limit: 10_000,
            accel_samples_per_orientation: SAMPLES_PER_ORIENTATION,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complementary filter attitude estimator.
pub struct AttitudeEstimator<S> {
    sensor: S,
    calibration: CalibrationParameters,
    ready_poll_limit: u32,
    gyro_filter: LowPassFilter<Vector3<f32>>,
    accel_filter: LowPassFilter<Vector3<f32>>,
    roll_filter: ComplementaryFilter,
    pitch_filter: ComplementaryFilter,
    yaw: f32,
    seeded: bool,
    estimate: OrientationEstimate,
    accel_session: AccelCalibrationSession,
}

impl<S: ImuSensor> AttitudeEstimator<S> {
    /// Creates an estimator reading from `sensor`.
    pub fn new(sensor: S, config: EstimatorConfig, calibration: CalibrationParameters) -> Self {
        Self {
            sensor,
            calibration,
            ready_poll_limit: config.ready_poll_limit,
            gyro_filter: LowPassFilter::new(config.gyro_filter_alpha),
            accel_filter: LowPassFilter::new(config.accel_filter_alpha),
            roll_filter: ComplementaryFilter::new(config.complementary_alpha),
            pitch_filter: ComplementaryFilter::new(config.complementary_alpha),
            yaw: 0.0,
            seeded: false,
            estimate: OrientationEstimate::level(),
            accel_session: AccelCalibrationSession::new(config.accel_samples_per_orientation),
        }
    }

    /// Initializes the sensor.
    pub fn init(&mut self) -> Result<(), Error> {
        info!("imu init");
        self.sensor.init().map_err(|e| {
            log::error!("imu init failed: {:?}", e);
            Error::PeripheralInit(Peripheral::Imu)
        })?;
        debug!("imu init success");
        Ok(())
    }

    /// Active calibration.
    pub fn calibration(&self) -> &CalibrationParameters {
        &self.calibration
    }

    /// Replaces the calibration and reseeds the filters.
    pub fn set_calibration(&mut self, calibration: CalibrationParameters) {
        self.calibration = calibration;
        self.reset();
    }

    /// Underlying sensor.
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Forgets the filter history. The next update seeds from the
    /// accelerometer and restarts yaw at zero.
    pub fn reset(&mut self) {
        self.gyro_filter.reset();
        self.accel_filter.reset();
        self.roll_filter.reset();
        self.pitch_filter.reset();
        self.yaw = 0.0;
        self.seeded = false;
        self.estimate = OrientationEstimate::level();
    }

    /// Waits for a sample and updates the estimate. `dt` is the time in
    /// seconds since the previous call.
    pub fn read(&mut self, dt: f32) -> OrientationEstimate {
        let sample = self.wait_sample();
        self.update(&sample, dt)
    }

    /// Updates the estimate from one sample.
    ///
    /// A sample with a non-finite component is dropped and the previous
    /// estimate returned, so it never reaches the filters.
    pub fn update(&mut self, sample: &RawImuSample, dt: f32) -> OrientationEstimate {
        let finite = sample.gyro.iter().chain(sample.accel.iter()).all(|v| v.is_finite());
        if !finite || !dt.is_finite() {
            warn!("dropping non-finite imu sample");
            return self.estimate;
        }

        let gyro = self
            .gyro_filter
            .filter(self.calibration.apply_gyro(sensor_to_flu(sample.gyro)) * DEG_TO_RAD);
        let accel = self
            .accel_filter
            .filter(self.calibration.apply_accel(-sensor_to_flu(sample.accel)));

        let accel_roll = (-accel.y).atan2(-accel.z);
        let accel_pitch = accel.x.atan2(accel.y.hypot(accel.z));

        let roll = fuse(&mut self.roll_filter, accel_roll, gyro.x, dt);
        let pitch = fuse(&mut self.pitch_filter, accel_pitch, gyro.y, dt);
        if self.seeded {
            self.yaw = normalize_angle(self.yaw + gyro.z * dt);
        }
        self.seeded = true;

        self.estimate = OrientationEstimate {
            orientation: Vector3::new(roll, pitch, self.yaw),
            angular_velocity: gyro,
            linear_acceleration: accel,
        };
        self.estimate
    }

    /// Averages `samples` stationary gyro readings into the gyro bias.
    /// Blocks until all samples are read.
    pub fn calibrate_gyro(&mut self, samples: u32) -> Result<Vector3<f32>, CalibrationError> {
        info!("gyro calibration start, {} samples", samples);
        let mut accumulator = GyroBiasAccumulator::new();
        for _ in 0..samples {
            let sample = self.wait_sample();
            accumulator.add(sensor_to_flu(sample.gyro));
        }

        let bias = accumulator.finish()?;
        self.calibration.gyro_bias = bias;
        self.reset();
        info!(
            "gyro calibration end, bias: {:.4} {:.4} {:.4}",
            bias.x, bias.y, bias.z
        );
        Ok(bias)
    }

    /// Starts a six orientation accelerometer sweep.
    pub fn start_accel_calibration(&mut self) {
        self.accel_session.start();
    }

    /// Continues the sweep after the vehicle was turned.
    pub fn resume_accel_calibration(&mut self) {
        self.accel_session.resume();
    }

    /// Abandons the sweep.
    pub fn cancel_accel_calibration(&mut self) {
        self.accel_session.cancel();
    }

    /// Whether a sweep is in progress, paused or not.
    pub fn is_accel_calibration_active(&self) -> bool {
        self.accel_session.is_active()
    }

    /// Whether the sweep is consuming samples.
    pub fn is_collecting_accel(&self) -> bool {
        self.accel_session.is_collecting()
    }

    /// Orientation the sweep is sampling or waiting for.
    pub fn accel_calibration_orientation(&self) -> u8 {
        self.accel_session.current_orientation()
    }

    /// Feeds the sweep with the next sample if one is ready. Never blocks.
    ///
    /// Returns `Ok(None)` when the sensor had no new data.
    pub fn update_accel_calibration(
        &mut self,
    ) -> Result<Option<AccelCalibrationStep>, CalibrationError> {
        if !self.accel_session.is_collecting() {
            return Err(CalibrationError::Inactive);
        }
        if !self.sensor.data_ready() {
            return Ok(None);
        }

        let sample = self.sensor.read_sample();
        let step = self
            .accel_session
            .add_sample(-sensor_to_flu(sample.accel), &mut self.calibration)?;
        if step == AccelCalibrationStep::Completed {
            self.reset();
        }
        Ok(Some(step))
    }

    fn wait_sample(&mut self) -> RawImuSample {
        for _ in 0..self.ready_poll_limit {
            if self.sensor.data_ready() {
                return self.sensor.read_sample();
            }
            core::hint::spin_loop();
        }
        warn!("imu data not ready, using latest sample");
        self.sensor.read_sample()
    }
}

/// Blends an angle measurement into `filter`. The measurement is unwrapped
/// next to the prediction so the blend never averages across ±π.
fn fuse(filter: &mut ComplementaryFilter, measurement: f32, rate: f32, dt: f32) -> f32 {
    let measurement = match filter.value() {
        Some(previous) => {
            let prediction = previous + rate * dt;
            prediction + normalize_angle(measurement - prediction)
        }
        None => measurement,
    };
    let angle = normalize_angle(filter.filter(measurement, rate, dt));
    filter.set(angle);
    angle
}
