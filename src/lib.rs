// src/lib.rs

//! # Quadrotor Flight Core
//!
//! A `no_std`, no-alloc flight control core for X-frame quadrotors. It
//! turns raw IMU samples and remote operator commands into per-motor duty
//! cycles once per control loop tick:
//!
//! - [`estimator`]: complementary filter attitude estimation in the FLU
//!   body frame, with gyro and accelerometer calibration,
//! - [`pid`]: per-axis rate controllers built on `piddiy`,
//! - [`behavior`]: manual and acrobatic (rate) flight behaviors,
//! - [`mixer`]: X-frame motor mixing,
//! - [`safety`]: the arming state machine,
//! - [`control_loop`]: the orchestration of all of the above.
//!
//! Hardware is reached through the traits in [`hal`] and
//! [`settings::Storage`], so the same code runs on a board and against
//! host mocks.

#![no_std]
#![deny(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod behavior;
pub mod config;
pub mod control_loop;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod hal;
pub mod link;
pub mod menu;
pub mod mixer;
pub mod pid;
pub mod safety;
pub mod settings;
pub mod time;

#[doc(inline)]
pub use config::FlightConfig;
#[doc(inline)]
pub use control_loop::{halt_and_restart, FlightController, TickOutcome};
#[doc(inline)]
pub use error::Error;

#[cfg(test)]
mod test_utils;
