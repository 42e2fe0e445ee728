// src/estimator/calibration.rs

//! # IMU Calibration
//!
//! Gyro bias averaging and the six orientation accelerometer min/max
//! sweep. Both work on samples already rotated into the body frame, so the
//! resulting parameters are subtracted and applied in that same frame.

use core::fmt;

use log::{debug, info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of orientations visited by the accelerometer sweep.
pub const ORIENTATIONS_TOTAL: u8 = 6;

/// Samples collected per orientation by default.
pub const SAMPLES_PER_ORIENTATION: u32 = 1000;

/// Body axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Forward.
    X,
    /// Left.
    Y,
    /// Up.
    Z,
}

impl Axis {
    /// All axes in vector index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Vector index of the axis.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Calibration failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// The axis never moved, its scale would be infinite.
    #[error("accelerometer {axis} axis has no range")]
    DegenerateAxis {
        /// Offending axis.
        axis: Axis,
    },
    /// The axis bounds are not finite numbers.
    #[error("accelerometer {axis} axis bounds are not finite")]
    NonFinite {
        /// Offending axis.
        axis: Axis,
    },
    /// A calibration was requested with no samples.
    #[error("no samples collected")]
    NoSamples,
    /// No accelerometer session is collecting.
    #[error("no calibration session is collecting")]
    Inactive,
}

/// Persisted sensor calibration, expressed in the body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Gyro offset in degrees per second.
    pub gyro_bias: Vector3<f32>,
    /// Accelerometer offset in sensor g.
    pub accel_bias: Vector3<f32>,
    /// Accelerometer gain per axis, strictly positive once calibrated.
    pub accel_scale: Vector3<f32>,
}

impl CalibrationParameters {
    /// Identity calibration: no bias, unit scale.
    pub fn new() -> Self {
        Self {
            gyro_bias: Vector3::zeros(),
            accel_bias: Vector3::zeros(),
            accel_scale: Vector3::repeat(1.0),
        }
    }

    /// Whether every component is finite and every scale strictly
    /// positive.
    pub fn is_valid(&self) -> bool {
        let finite = |v: &Vector3<f32>| v.iter().all(|c| c.is_finite());
        finite(&self.gyro_bias)
            && finite(&self.accel_bias)
            && finite(&self.accel_scale)
            && self.accel_scale.iter().all(|s| *s > 0.0)
    }

    /// Removes the gyro bias.
    pub fn apply_gyro(&self, gyro: Vector3<f32>) -> Vector3<f32> {
        gyro - self.gyro_bias
    }

    /// Removes the accelerometer bias and applies the per-axis scale.
    pub fn apply_accel(&self, accel: Vector3<f32>) -> Vector3<f32> {
        (accel - self.accel_bias).component_mul(&self.accel_scale)
    }
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Running mean of stationary gyro readings.
#[derive(Debug, Clone, Copy)]
pub struct GyroBiasAccumulator {
    sum: Vector3<f32>,
    count: u32,
}

impl GyroBiasAccumulator {
    /// Starts an empty accumulation.
    pub fn new() -> Self {
        Self {
            sum: Vector3::zeros(),
            count: 0,
        }
    }

    /// Adds one reading.
    pub fn add(&mut self, gyro: Vector3<f32>) {
        self.sum += gyro;
        self.count += 1;
    }

    /// Number of readings so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean of the readings.
    pub fn finish(&self) -> Result<Vector3<f32>, CalibrationError> {
        if self.count == 0 {
            return Err(CalibrationError::NoSamples);
        }
        Ok(self.sum / self.count as f32)
    }
}

impl Default for GyroBiasAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of feeding one sample to an [`AccelCalibrationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelCalibrationStep {
    /// The sample was recorded, keep the vehicle still.
    Sampling,
    /// The orientation quota is reached. The session is paused until the
    /// operator has turned the vehicle and resumed.
    OrientationCollected {
        /// Orientation that will be sampled after resuming.
        next_orientation: u8,
    },
    /// All orientations were sampled and the parameters were updated.
    Completed,
}

/// Tick driven accelerometer min/max sweep over six orientations.
#[derive(Debug, Clone, Copy)]
pub struct AccelCalibrationSession {
    accel_min: Vector3<f32>,
    accel_max: Vector3<f32>,
    samples_collected: u32,
    samples_per_orientation: u32,
    current_orientation: u8,
    active: bool,
    paused: bool,
}

impl AccelCalibrationSession {
    /// Creates an inactive session collecting `samples_per_orientation`
    /// samples in each orientation.
    pub fn new(samples_per_orientation: u32) -> Self {
        Self {
            accel_min: Vector3::repeat(f32::INFINITY),
            accel_max: Vector3::repeat(f32::NEG_INFINITY),
            samples_collected: 0,
            samples_per_orientation: samples_per_orientation.max(1),
            current_orientation: 0,
            active: false,
            paused: false,
        }
    }

    /// Resets the bounds and starts sampling orientation 0.
    pub fn start(&mut self) {
        info!("accel calibration start");
        self.accel_min = Vector3::repeat(f32::INFINITY);
        self.accel_max = Vector3::repeat(f32::NEG_INFINITY);
        self.samples_collected = 0;
        self.current_orientation = 0;
        self.active = true;
        self.paused = false;
    }

    /// Abandons the session without touching the parameters.
    pub fn cancel(&mut self) {
        self.active = false;
        self.paused = false;
    }

    /// Continues after the operator turned the vehicle.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether a sweep is in progress, paused or not.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether samples are currently being consumed.
    pub fn is_collecting(&self) -> bool {
        self.active && !self.paused
    }

    /// Index of the orientation being or about to be sampled.
    pub fn current_orientation(&self) -> u8 {
        self.current_orientation
    }

    /// Samples recorded in the current orientation.
    pub fn samples_collected(&self) -> u32 {
        self.samples_collected
    }

    /// Records one body frame accelerometer sample.
    ///
    /// After the last orientation the bias is set to the midpoint and the
    /// scale to `2 / range` per axis and written into `params`. An axis
    /// without range fails the whole sweep and leaves `params` untouched.
    pub fn add_sample(
        &mut self,
        accel: Vector3<f32>,
        params: &mut CalibrationParameters,
    ) -> Result<AccelCalibrationStep, CalibrationError> {
        if !self.is_collecting() {
            return Err(CalibrationError::Inactive);
        }
        if !accel.iter().all(|v| v.is_finite()) {
            warn!("dropping non-finite accel sample");
            return Ok(AccelCalibrationStep::Sampling);
        }

        self.accel_min = self.accel_min.inf(&accel);
        self.accel_max = self.accel_max.sup(&accel);
        self.samples_collected += 1;

        if self.samples_collected < self.samples_per_orientation {
            return Ok(AccelCalibrationStep::Sampling);
        }

        self.samples_collected = 0;
        self.current_orientation += 1;
        self.paused = true;

        if self.current_orientation < ORIENTATIONS_TOTAL {
            debug!("orientation {} collected", self.current_orientation);
            return Ok(AccelCalibrationStep::OrientationCollected {
                next_orientation: self.current_orientation,
            });
        }

        self.active = false;
        self.paused = false;

        let (bias, scale) = self.solve()?;
        params.accel_bias = bias;
        params.accel_scale = scale;

        info!(
            "accel calibration end, bias: {:.4} {:.4} {:.4}, scale: {:.4} {:.4} {:.4}",
            bias.x, bias.y, bias.z, scale.x, scale.y, scale.z
        );
        Ok(AccelCalibrationStep::Completed)
    }

    fn solve(&self) -> Result<(Vector3<f32>, Vector3<f32>), CalibrationError> {
        for axis in Axis::ALL {
            let min = self.accel_min[axis.index()];
            let max = self.accel_max[axis.index()];
            if !min.is_finite() || !max.is_finite() {
                return Err(CalibrationError::NonFinite { axis });
            }
            if max - min <= 0.0 {
                return Err(CalibrationError::DegenerateAxis { axis });
            }
        }

        let bias = (self.accel_min + self.accel_max) * 0.5;
        let scale = (self.accel_max - self.accel_min).map(|range| 2.0 / range);
        Ok((bias, scale))
    }
}

impl Default for AccelCalibrationSession {
    fn default() -> Self {
        Self::new(SAMPLES_PER_ORIENTATION)
    }
}
