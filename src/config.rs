// src/config.rs

//! # Flight Configuration
//!
//! Every tunable constant of the flight core, with the reference values as
//! defaults. Boards override individual fields before booting.

use core::f32::consts::PI;

use crate::behavior::AcrobaticConfig;
use crate::estimator::EstimatorConfig;
use crate::pid::AxisControllerConfig;
use crate::time::Duration;

const CRITICAL_ANGLE_DEG: f32 = 60.0;
const CRITICAL_ANGLE: f32 = CRITICAL_ANGLE_DEG * PI / 180.0;

/// Tuning and safety limits of the flight controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightConfig {
    /// Attitude estimator filters and sampling.
    pub estimator: EstimatorConfig,
    /// Stationary samples averaged by the gyro calibration.
    pub gyro_calibration_samples: u32,
    /// Roll or pitch magnitude in radians beyond which the vehicle disarms.
    pub critical_angle: f32,
    /// Longest silence of the command link tolerated while armed.
    pub link_timeout: Duration,
    /// Delay before restarting after a fatal error.
    pub fatal_restart_delay_ms: u32,
    /// Acrobatic behavior tuning.
    pub acrobatic: AcrobaticConfig,
    /// Roll and pitch rate gains, used when none are stored.
    pub roll_pitch_gains: AxisControllerConfig,
    /// Yaw rate gains, used when none are stored.
    pub yaw_gains: AxisControllerConfig,
}

impl FlightConfig {
    /// Reference configuration.
    pub const fn new() -> Self {
        Self {
            estimator: EstimatorConfig::new(),
            gyro_calibration_samples: 5000,
            critical_angle: CRITICAL_ANGLE,
            link_timeout: Duration::millis(200),
            fatal_restart_delay_ms: 5000,
            acrobatic: AcrobaticConfig::new(),
            roll_pitch_gains: AxisControllerConfig::roll_pitch_rate(),
            yaw_gains: AxisControllerConfig::yaw_rate(),
        }
    }
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self::new()
    }
}
