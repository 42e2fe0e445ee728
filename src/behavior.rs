// src/behavior.rs

//! # Flight Behaviors
//!
//! A flight behavior turns the operator setpoint and the latest attitude
//! estimate into the control vector handed to the mixer. Exactly one
//! behavior is active at a time; the control loop owns it as an
//! [`ActiveBehavior`] and switches explicitly, running the outgoing
//! behavior's disarm hook first so no integrator state carries over.

pub mod acrobatic;
pub mod manual;

pub use acrobatic::*;
pub use manual::*;

use crate::estimator::OrientationEstimate;
use crate::link::OperatorSetpoint;
use crate::mixer::ControlVector;

/// Shared interface of the flight behaviors.
pub trait FlightBehavior {
    /// Computes the control vector for one tick.
    ///
    /// - `setpoint`: latest operator command.
    /// - `dt`: seconds since the previous tick.
    /// - `estimate`: current attitude and body rates.
    fn interpret(
        &mut self,
        setpoint: &OperatorSetpoint,
        dt: f32,
        estimate: &OrientationEstimate,
    ) -> ControlVector;

    /// Drops any internal state. Called on every disarm and before the
    /// behavior is switched out.
    fn on_disarm(&mut self);
}

/// Selectable behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    /// Sticks mixed directly.
    Manual,
    /// Sticks command body rates.
    Acrobatic,
}

/// The behavior currently bound to the control loop.
pub enum ActiveBehavior {
    /// Direct mixing.
    Manual(ManualBehavior),
    /// Rate control.
    Acrobatic(AcrobaticBehavior),
}

impl ActiveBehavior {
    /// Which behavior is bound.
    pub fn kind(&self) -> BehaviorKind {
        match self {
            ActiveBehavior::Manual(_) => BehaviorKind::Manual,
            ActiveBehavior::Acrobatic(_) => BehaviorKind::Acrobatic,
        }
    }

    /// The acrobatic behavior, if bound.
    pub fn acrobatic_mut(&mut self) -> Option<&mut AcrobaticBehavior> {
        match self {
            ActiveBehavior::Acrobatic(behavior) => Some(behavior),
            ActiveBehavior::Manual(_) => None,
        }
    }
}

impl FlightBehavior for ActiveBehavior {
    fn interpret(
        &mut self,
        setpoint: &OperatorSetpoint,
        dt: f32,
        estimate: &OrientationEstimate,
    ) -> ControlVector {
        match self {
            ActiveBehavior::Manual(behavior) => behavior.interpret(setpoint, dt, estimate),
            ActiveBehavior::Acrobatic(behavior) => behavior.interpret(setpoint, dt, estimate),
        }
    }

    fn on_disarm(&mut self) {
        match self {
            ActiveBehavior::Manual(behavior) => behavior.on_disarm(),
            ActiveBehavior::Acrobatic(behavior) => behavior.on_disarm(),
        }
    }
}
