// src/behavior/acrobatic.rs

//! # Acrobatic (Rate) Behavior
//!
//! Stick deflection commands a body rate: full deflection asks for
//! `power_to_rate` radians per second about that axis. One
//! [`AxisController`] per axis drives the rate error to zero.
//!
//! The yaw error is low-pass filtered before its controller to damp stick
//! jitter, and the yaw output is inverted: raising the counter-clockwise
//! rotor pair yaws the frame clockwise. Roll and pitch outputs already
//! turn the frame in the direction of positive FLU rate through the mixer.

use crate::behavior::FlightBehavior;
use crate::estimator::OrientationEstimate;
use crate::filter::LowPassFilter;
use crate::link::OperatorSetpoint;
use crate::mixer::ControlVector;
use crate::pid::{AxisController, AxisControllerConfig};

/// Acrobatic behavior tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcrobaticConfig {
    /// Body rate in radians per second at full stick deflection.
    pub power_to_rate: f32,
    /// Input weight of the yaw error low-pass filter.
    pub yaw_error_filter_alpha: f32,
}

impl AcrobaticConfig {
    /// Reference tuning.
    pub const fn new() -> Self {
        Self {
            power_to_rate: 3.0,
            yaw_error_filter_alpha: 0.4,
        }
    }
}

impl Default for AcrobaticConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate controlled flight.
pub struct AcrobaticBehavior {
    config: AcrobaticConfig,
    roll: AxisController,
    pitch: AxisController,
    yaw: AxisController,
    yaw_error_filter: LowPassFilter<f32>,
}

impl AcrobaticBehavior {
    /// Creates the behavior. Roll and pitch share one gain set.
    pub fn new(
        config: AcrobaticConfig,
        roll_pitch_gains: AxisControllerConfig,
        yaw_gains: AxisControllerConfig,
    ) -> Self {
        Self {
            config,
            roll: AxisController::with_config(roll_pitch_gains),
            pitch: AxisController::with_config(roll_pitch_gains),
            yaw: AxisController::with_config(yaw_gains),
            yaw_error_filter: LowPassFilter::new(config.yaw_error_filter_alpha),
        }
    }

    /// Replaces the gains. Controller state starts over.
    pub fn set_gains(
        &mut self,
        roll_pitch_gains: AxisControllerConfig,
        yaw_gains: AxisControllerConfig,
    ) {
        *self = Self::new(self.config, roll_pitch_gains, yaw_gains);
    }

    /// Roll and pitch gains.
    pub fn roll_pitch_gains(&self) -> &AxisControllerConfig {
        self.roll.config()
    }

    /// Yaw gains.
    pub fn yaw_gains(&self) -> &AxisControllerConfig {
        self.yaw.config()
    }

    /// Desired body rates in radians per second for a setpoint.
    pub fn desired_rates(&self, setpoint: &OperatorSetpoint) -> (f32, f32, f32) {
        let rate = self.config.power_to_rate;
        (
            setpoint.roll_power * rate,
            setpoint.pitch_power * rate,
            setpoint.yaw_power * rate,
        )
    }
}

impl FlightBehavior for AcrobaticBehavior {
    fn interpret(
        &mut self,
        setpoint: &OperatorSetpoint,
        dt: f32,
        estimate: &OrientationEstimate,
    ) -> ControlVector {
        let (roll_rate, pitch_rate, yaw_rate) = self.desired_rates(setpoint);

        let roll = self.roll.calc(roll_rate - estimate.roll_rate(), dt);
        let pitch = self.pitch.calc(pitch_rate - estimate.pitch_rate(), dt);
        let yaw_error = self
            .yaw_error_filter
            .filter(yaw_rate - estimate.yaw_rate());
        let yaw = -self.yaw.calc(yaw_error, dt);

        ControlVector {
            thrust: setpoint.thrust,
            roll,
            pitch,
            yaw,
        }
    }

    fn on_disarm(&mut self) {
        self.roll.reset();
        self.pitch.reset();
        self.yaw.reset();
        self.yaw_error_filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{mix, MotorIndex};
    use crate::test_utils::*;

    fn proportional(p: f32) -> AxisControllerConfig {
        AxisControllerConfig {
            p,
            i: 0.0,
            d: 0.0,
            ..AxisControllerConfig::new()
        }
    }

    fn setpoint(roll: f32, pitch: f32, yaw: f32, thrust: f32) -> OperatorSetpoint {
        OperatorSetpoint {
            roll_power: roll,
            pitch_power: pitch,
            yaw_power: yaw,
            thrust,
            armed: true,
        }
    }

    /// Test a full roll deflection through the rate loop and the mixer.
    #[test]
    fn test_acrobatic_roll_end_to_end() {
        let mut behavior =
            AcrobaticBehavior::new(AcrobaticConfig::new(), proportional(0.05), proportional(0.05));
        let estimate = OrientationEstimate::level();

        let control = behavior.interpret(&setpoint(1.0, 0.0, 0.0, 0.5), 0.02, &estimate);
        assert!(value_close(0.15, control.roll), "0.05 * (1.0 * 3.0 - 0).");
        assert!(value_close(0.0, control.pitch));
        assert!(value_close(0.0, control.yaw));

        let command = mix(control);
        assert!(value_close(0.65, command.duty(MotorIndex::FrontLeft)), "Front left.");
        assert!(value_close(0.35, command.duty(MotorIndex::FrontRight)), "Front right.");
        assert!(value_close(0.65, command.duty(MotorIndex::BackLeft)), "Back left.");
        assert!(value_close(0.35, command.duty(MotorIndex::BackRight)), "Back right.");
    }

    /// Test that the measured rate is subtracted from the desired rate.
    #[test]
    fn test_acrobatic_rate_error() {
        let mut behavior =
            AcrobaticBehavior::new(AcrobaticConfig::new(), proportional(0.1), proportional(0.1));
        let mut estimate = OrientationEstimate::level();
        estimate.angular_velocity = nalgebra::Vector3::new(1.0, -1.0, 0.0);

        let control = behavior.interpret(&setpoint(0.5, 0.5, 0.0, 0.3), 0.01, &estimate);
        assert!(value_close(0.05, control.roll), "0.1 * (1.5 - 1.0).");
        assert!(value_close(0.25, control.pitch), "0.1 * (1.5 + 1.0).");
        assert!(value_close(0.3, control.thrust));
    }

    /// Test the yaw inversion and the yaw error filter.
    #[test]
    fn test_acrobatic_yaw() {
        let mut behavior =
            AcrobaticBehavior::new(AcrobaticConfig::new(), proportional(0.1), proportional(0.1));
        let estimate = OrientationEstimate::level();

        let first = behavior.interpret(&setpoint(0.0, 0.0, 1.0, 0.5), 0.01, &estimate);
        assert!(value_close(-0.3, first.yaw), "First error seeds the filter.");

        let second = behavior.interpret(&setpoint(0.0, 0.0, 0.0, 0.5), 0.01, &estimate);
        // filtered error 3.0 * 0.6 + 0.0 * 0.4
        assert!(value_close(-0.18, second.yaw), "Filtered error.");
    }

    /// Test that disarming clears every controller.
    #[test]
    fn test_acrobatic_on_disarm() {
        let gains = AxisControllerConfig {
            p: 0.05,
            i: 0.5,
            d: 0.001,
            integrator_limit: 1.0,
            output_min: -1.0,
            output_max: 1.0,
            derivative_filter_alpha: 0.5,
        };
        let estimate = OrientationEstimate::level();
        let input = setpoint(0.4, -0.2, 0.3, 0.5);

        let mut fresh = AcrobaticBehavior::new(AcrobaticConfig::new(), gains, gains);
        let expected = fresh.interpret(&input, 0.01, &estimate);

        let mut behavior = AcrobaticBehavior::new(AcrobaticConfig::new(), gains, gains);
        for _ in 0..50 {
            behavior.interpret(&setpoint(1.0, 1.0, -1.0, 0.5), 0.01, &estimate);
        }
        behavior.on_disarm();
        let control = behavior.interpret(&input, 0.01, &estimate);

        assert!(value_close(expected.roll, control.roll), "Roll restarts.");
        assert!(value_close(expected.pitch, control.pitch), "Pitch restarts.");
        assert!(value_close(expected.yaw, control.yaw), "Yaw restarts.");
    }

    /// Test replacing the gains at runtime.
    #[test]
    fn test_acrobatic_set_gains() {
        let mut behavior =
            AcrobaticBehavior::new(AcrobaticConfig::new(), proportional(0.05), proportional(0.05));
        behavior.set_gains(proportional(0.1), proportional(0.2));
        assert_eq!(proportional(0.1), *behavior.roll_pitch_gains());
        assert_eq!(proportional(0.2), *behavior.yaw_gains());

        let control =
            behavior.interpret(&setpoint(1.0, 0.0, 0.0, 0.5), 0.02, &OrientationEstimate::level());
        assert!(value_close(0.3, control.roll), "New gain applies.");
    }
}
