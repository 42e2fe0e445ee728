// src/time.rs

//! Microsecond time base and loop timing.

/// Monotonic timestamp with microsecond resolution.
pub type Instant = fugit::Instant<u64, 1, 1_000_000>;

/// Span of time with microsecond resolution.
pub type Duration = fugit::Duration<u64, 1, 1_000_000>;

/// Measures the time between successive control loop ticks.
#[derive(Debug, Clone, Copy)]
pub struct Chronometer {
    last: Instant,
}

impl Chronometer {
    /// Starts measuring from `now`.
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Seconds since the previous lap (or since construction) and restarts
    /// the measurement at `now`. A clock that went backwards yields `0.0`.
    pub fn lap(&mut self, now: Instant) -> f32 {
        let elapsed = now
            .checked_duration_since(self.last)
            .map(|d| d.to_micros())
            .unwrap_or(0);
        self.last = now;
        elapsed as f32 * 1e-6
    }
}
