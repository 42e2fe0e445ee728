// src/pid.rs

//! # PID Control Module
//!
//! This module provides the compute function and control data structures
//! used to run one PID (Proportional-Integral-Derivative) controller per
//! rate axis, on top of the `piddiy` controller core.

use piddiy::Number as PiddiyNumber;

pub mod axis;
pub use axis::*;

/// Custom trait to encapsulate base number requirements.
pub trait Number: PiddiyNumber {
    /// Clamps generic PartialOrd values within a given range.
    fn clamp(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if max < self {
            max
        } else {
            self
        }
    }
}

impl<T: PiddiyNumber> Number for T {}

/// Longest `dt` in seconds a controller accepts. Longer gaps mean the loop
/// stalled and the update is skipped.
pub const DT_CEILING: f32 = 0.1;
