// src/filter.rs

//! # Signal Filters
//!
//! First order low-pass and complementary filters shared by the attitude
//! estimator and the rate controllers. Both filters seed themselves from
//! the first value they see after construction or [`reset`](LowPassFilter::reset)
//! instead of blending against a zero initial state.

use core::ops::{Add, Mul};

/// Exponential low-pass filter.
///
/// `alpha` is the weight given to the newest input:
/// `filtered = filtered * (1 - alpha) + input * alpha`.
/// An `alpha` of `1.0` passes the input through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter<V> {
    alpha: f32,
    filtered: Option<V>,
}

impl<V> LowPassFilter<V>
where
    V: Copy + Add<Output = V> + Mul<f32, Output = V>,
{
    /// Creates a filter with the given input weight.
    pub const fn new(alpha: f32) -> Self {
        Self {
            alpha,
            filtered: None,
        }
    }

    /// Feeds one input and returns the filtered value.
    pub fn filter(&mut self, input: V) -> V {
        let output = match self.filtered {
            Some(previous) if self.alpha < 1.0 => {
                previous * (1.0 - self.alpha) + input * self.alpha
            }
            _ => input,
        };
        self.filtered = Some(output);
        output
    }

    /// Last filtered value, if any input was seen since the last reset.
    pub fn value(&self) -> Option<V> {
        self.filtered
    }

    /// Input weight.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Forgets the filtered state. The next input seeds the filter.
    pub fn reset(&mut self) {
        self.filtered = None;
    }
}

/// Complementary filter blending an integrated rate with an absolute
/// measurement of the same quantity.
///
/// `filtered = alpha * (filtered + rate * dt) + (1 - alpha) * measurement`
///
/// With `alpha` just below one the rate dominates over short horizons and
/// the absolute measurement slowly removes the integration drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplementaryFilter {
    alpha: f32,
    filtered: Option<f32>,
}

impl ComplementaryFilter {
    /// Creates a filter with the given rate weight.
    pub const fn new(alpha: f32) -> Self {
        Self {
            alpha,
            filtered: None,
        }
    }

    /// Fuses one absolute `measurement` with the `rate` observed over `dt`
    /// seconds.
    pub fn filter(&mut self, measurement: f32, rate: f32, dt: f32) -> f32 {
        let output = match self.filtered {
            Some(previous) => {
                let prediction = previous + rate * dt;
                self.alpha * prediction + (1.0 - self.alpha) * measurement
            }
            None => measurement,
        };
        self.filtered = Some(output);
        output
    }

    /// Filtered state, `None` before the first measurement.
    pub fn value(&self) -> Option<f32> {
        self.filtered
    }

    /// Overrides the filtered state, e.g. after wrapping an angle.
    pub fn set(&mut self, value: f32) {
        self.filtered = Some(value);
    }

    /// Forgets the filtered state. The next measurement seeds the filter.
    pub fn reset(&mut self) {
        self.filtered = None;
    }
}
