// src/error.rs

//! # Error Types
//!
//! Failures that leave the normal control path. Peripheral initialization
//! errors are fatal and lead to a restart, everything else is recovered
//! locally by discarding the offending input and logging it.

use core::fmt;
use thiserror::Error;

use crate::estimator::calibration::CalibrationError;
use crate::settings::SettingsError;

/// A peripheral the flight core depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    /// The inertial measurement unit.
    Imu,
    /// The motor PWM outputs.
    Motors,
    /// The wireless link to the remote.
    Radio,
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Peripheral::Imu => "imu",
            Peripheral::Motors => "motors",
            Peripheral::Radio => "radio",
        };
        f.write_str(name)
    }
}

/// Crate level error.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum Error {
    /// A peripheral failed to initialize. The vehicle must not fly.
    #[error("{0} initialization failed")]
    PeripheralInit(Peripheral),
    /// A calibration routine could not produce usable parameters.
    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),
    /// Settings could not be loaded or stored.
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),
    /// A rate gain set is malformed.
    #[error("invalid rate gains")]
    InvalidGains,
    /// The operation is only permitted while disarmed.
    #[error("operation refused while armed")]
    Armed,
}
