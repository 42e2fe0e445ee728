// src/pid/axis.rs

//! # Axis Rate Controller
//!
//! One PID controller per control axis with integrator anti-windup, a
//! low-pass filtered derivative and output clamping. The proportional,
//! integral and derivative terms are combined by `piddiy`; the
//! [`AxisController`] wrapper owns the state that has to survive between
//! updates outside of it (previous error and derivative filter).

use crate::filter::LowPassFilter;
use crate::pid::{Number, DT_CEILING};
use piddiy::PidController;
use serde::{Deserialize, Serialize};

/// Control data for the axis compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControlData<T> {
    /// Setpoint minus measurement.
    pub error: T,
    /// The time delta since the last computation.
    pub dt: T,
    /// The maximum allowed magnitude of the integral term, used to prevent integral windup.
    pub integral_limit: T,
    /// Whether the error should be accumulated this update.
    pub integrate: bool,
    /// Filtered rate of change of the error, zero when unavailable.
    pub derivative: T,
}

/// Axis PID compute callback.
///
/// Returns `(error, integral, derivative)`; the integral saturates at
/// `±integral_limit` and is left untouched when `integrate` is unset.
pub fn compute_axis<T: Number>(
    pid: &mut PidController<T, AxisControlData<T>>,
    data: AxisControlData<T>,
) -> (T, T, T) {
    let integral = if data.integrate {
        Number::clamp(
            pid.integral + data.error * data.dt,
            -data.integral_limit,
            data.integral_limit,
        )
    } else {
        pid.integral
    };

    (data.error, integral, data.derivative)
}

/// Gains and limits of one axis controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisControllerConfig {
    /// Proportional gain.
    pub p: f32,
    /// Integral gain.
    pub i: f32,
    /// Derivative gain.
    pub d: f32,
    /// Magnitude limit of the accumulated integral.
    pub integrator_limit: f32,
    /// Lower output bound.
    pub output_min: f32,
    /// Upper output bound.
    pub output_max: f32,
    /// Input weight of the derivative low-pass filter, `1.0` disables filtering.
    pub derivative_filter_alpha: f32,
}

impl AxisControllerConfig {
    /// Creates a proportional-only configuration with a symmetric unit output range.
    pub const fn new() -> Self {
        Self {
            p: 1.0,
            i: 0.0,
            d: 0.0,
            integrator_limit: 1.0,
            output_min: -1.0,
            output_max: 1.0,
            derivative_filter_alpha: 1.0,
        }
    }

    /// Default roll and pitch rate gains.
    pub const fn roll_pitch_rate() -> Self {
        Self {
            p: 0.05,
            i: 0.01,
            d: 0.0002,
            integrator_limit: 0.1,
            output_min: -1.0,
            output_max: 1.0,
            derivative_filter_alpha: 0.2,
        }
    }

    /// Default yaw rate gains.
    pub const fn yaw_rate() -> Self {
        Self {
            p: 0.03,
            i: 0.005,
            d: 0.0002,
            integrator_limit: 0.1,
            output_min: -1.0,
            output_max: 1.0,
            derivative_filter_alpha: 0.8,
        }
    }
}

impl AxisControllerConfig {
    /// Whether every field is finite, the output range is ordered and the
    /// filter weight lies in `(0, 1]`.
    pub fn is_valid(&self) -> bool {
        let values = [
            self.p,
            self.i,
            self.d,
            self.integrator_limit,
            self.output_min,
            self.output_max,
            self.derivative_filter_alpha,
        ];
        values.iter().all(|v| v.is_finite())
            && self.integrator_limit >= 0.0
            && self.output_min <= self.output_max
            && self.derivative_filter_alpha > 0.0
            && self.derivative_filter_alpha <= 1.0
    }
}

impl Default for AxisControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// PID controller for a single rate axis.
pub struct AxisController {
    pid: PidController<f32, AxisControlData<f32>>,
    config: AxisControllerConfig,
    last_error: Option<f32>,
    derivative_filter: LowPassFilter<f32>,
}

impl AxisController {
    /// Creates a controller using the provided configuration.
    pub fn with_config(config: AxisControllerConfig) -> Self {
        let mut pid = PidController::new();
        pid.compute_fn(compute_axis)
            .set_point(0.0)
            .kp(config.p)
            .ki(config.i)
            .kd(config.d);

        AxisController {
            pid,
            config,
            last_error: None,
            derivative_filter: LowPassFilter::new(config.derivative_filter_alpha),
        }
    }

    /// Creates a controller with default settings.
    pub fn new() -> Self {
        Self::with_config(AxisControllerConfig::new())
    }

    /// Active configuration.
    pub fn config(&self) -> &AxisControllerConfig {
        &self.config
    }

    /// Accumulated integral.
    pub fn integral(&self) -> f32 {
        self.pid.integral
    }

    /// Computes the clamped controller output for `error` after `dt` seconds.
    ///
    /// Returns `0.0` without touching any state when `dt` is not positive
    /// or exceeds [`DT_CEILING`].
    pub fn calc(&mut self, error: f32, dt: f32) -> f32 {
        if !(dt > 0.0 && dt <= DT_CEILING) {
            return 0.0;
        }

        let derivative = match self.last_error {
            Some(last_error) if self.config.d != 0.0 => {
                self.derivative_filter.filter((error - last_error) / dt)
            }
            _ => 0.0,
        };
        self.last_error = Some(error);

        let data = AxisControlData {
            error,
            dt,
            integral_limit: self.config.integrator_limit,
            integrate: self.config.i != 0.0,
            derivative,
        };
        let output = self.pid.compute(data);

        if output.is_nan() {
            return 0.0;
        }
        Number::clamp(output, self.config.output_min, self.config.output_max)
    }

    /// Clears the integral, the derivative filter and the previous error.
    pub fn reset(&mut self) {
        self.pid.integral = 0.0;
        self.pid.error = 0.0;
        self.last_error = None;
        self.derivative_filter.reset();
    }
}

impl Default for AxisController {
    fn default() -> Self {
        Self::new()
    }
}
