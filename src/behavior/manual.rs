// src/behavior/manual.rs

//! Direct mixing of the operator sticks.

use crate::behavior::FlightBehavior;
use crate::estimator::OrientationEstimate;
use crate::link::OperatorSetpoint;
use crate::mixer::ControlVector;

/// Passes the sticks straight to the mixer. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualBehavior;

impl FlightBehavior for ManualBehavior {
    fn interpret(
        &mut self,
        setpoint: &OperatorSetpoint,
        _dt: f32,
        _estimate: &OrientationEstimate,
    ) -> ControlVector {
        ControlVector {
            thrust: setpoint.thrust,
            roll: setpoint.roll_power,
            pitch: setpoint.pitch_power,
            yaw: setpoint.yaw_power,
        }
    }

    fn on_disarm(&mut self) {}
}
