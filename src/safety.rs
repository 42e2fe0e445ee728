// src/safety.rs

//! # Arming Supervisor
//!
//! Owns the armed flag. The vehicle arms only on a fresh operator setpoint
//! with the arm bit set while the link is live, no fault is latched and no
//! accelerometer calibration runs. It disarms when
//!
//! - no setpoint arrived within the link timeout,
//! - roll or pitch exceeds the critical angle,
//! - the operator clears the arm bit.
//!
//! The first two are faults. A fault stays latched until the operator
//! clears the arm bit, so the vehicle never re-arms by itself.

use log::{info, warn};
#[allow(unused_imports)]
use num_traits::Float;

use crate::estimator::OrientationEstimate;
use crate::link::CommandSnapshot;
use crate::time::{Duration, Instant};

/// Why the vehicle disarmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisarmReason {
    /// No setpoint within the link timeout.
    LinkTimeout,
    /// Roll or pitch beyond the critical angle.
    CriticalAttitude,
    /// The operator cleared the arm bit.
    Operator,
}

impl DisarmReason {
    /// Whether the reason latches a fault.
    pub fn is_fault(self) -> bool {
        !matches!(self, DisarmReason::Operator)
    }
}

/// A change of the armed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmingTransition {
    /// Disarmed to armed.
    Armed,
    /// Armed to disarmed.
    Disarmed(DisarmReason),
}

/// Armed flag and link deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingState {
    /// Whether actuation is permitted.
    pub armed: bool,
    /// The link is considered lost from this instant on. `None` before the
    /// first setpoint.
    pub next_timeout_deadline: Option<Instant>,
}

/// Arming state machine.
#[derive(Debug, Clone)]
pub struct ArmingSupervisor {
    state: ArmingState,
    link_timeout: Duration,
    critical_angle: f32,
    last_sequence: u32,
    fault_latched: bool,
}

impl ArmingSupervisor {
    /// Creates a disarmed supervisor.
    ///
    /// - `link_timeout`: longest tolerated gap between setpoints.
    /// - `critical_angle`: roll or pitch magnitude in radians that disarms.
    pub fn new(link_timeout: Duration, critical_angle: f32) -> Self {
        Self {
            state: ArmingState {
                armed: false,
                next_timeout_deadline: None,
            },
            link_timeout,
            critical_angle,
            last_sequence: 0,
            fault_latched: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ArmingState {
        &self.state
    }

    /// Whether actuation is permitted.
    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    /// Whether a fault blocks arming.
    pub fn is_fault_latched(&self) -> bool {
        self.fault_latched
    }

    /// Whether the link delivered a setpoint within the timeout.
    pub fn is_link_live(&self, now: Instant) -> bool {
        self.state
            .next_timeout_deadline
            .is_some_and(|deadline| now < deadline)
    }

    /// Applies the latest setpoint, if it is new since the last call.
    ///
    /// `arming_allowed` is `false` while the vehicle is not fit to fly, such
    /// as during a calibration or beyond the critical angle.
    pub fn observe_command(
        &mut self,
        snapshot: &CommandSnapshot,
        now: Instant,
        arming_allowed: bool,
    ) -> Option<ArmingTransition> {
        if snapshot.sequence == self.last_sequence {
            return None;
        }
        self.last_sequence = snapshot.sequence;
        if let Some(received_at) = snapshot.received_at {
            self.state.next_timeout_deadline = Some(received_at + self.link_timeout);
        }

        if !snapshot.setpoint.armed {
            if self.fault_latched {
                info!("fault cleared by operator");
                self.fault_latched = false;
            }
            return self.disarm(DisarmReason::Operator);
        }

        if self.state.armed {
            return None;
        }
        if self.fault_latched {
            warn!("arming refused, clear the arm switch first");
            return None;
        }
        if !arming_allowed {
            warn!("arming refused, vehicle not ready");
            return None;
        }
        if !self.is_link_live(now) {
            warn!("arming refused, stale setpoint");
            return None;
        }

        info!("armed");
        self.state.armed = true;
        Some(ArmingTransition::Armed)
    }

    /// Disarms if the link timed out.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<ArmingTransition> {
        if !self.state.armed || self.is_link_live(now) {
            return None;
        }
        warn!("link timeout. Disarming");
        self.disarm(DisarmReason::LinkTimeout)
    }

    /// Whether roll and pitch are within the critical angle. A NaN attitude
    /// is not.
    pub fn is_attitude_safe(&self, estimate: &OrientationEstimate) -> bool {
        let limit = self.critical_angle;
        let within = |angle: f32| angle.abs() <= limit;
        within(estimate.roll()) && within(estimate.pitch())
    }

    /// Disarms if roll or pitch exceeds the critical angle. A NaN attitude
    /// counts as critical.
    pub fn check_attitude(&mut self, estimate: &OrientationEstimate) -> Option<ArmingTransition> {
        if !self.state.armed || self.is_attitude_safe(estimate) {
            return None;
        }
        warn!(
            "critical roll/pitch ({:.2}, {:.2}). Disarming",
            estimate.roll(),
            estimate.pitch()
        );
        self.disarm(DisarmReason::CriticalAttitude)
    }

    fn disarm(&mut self, reason: DisarmReason) -> Option<ArmingTransition> {
        if reason.is_fault() {
            self.fault_latched = true;
        }
        if !self.state.armed {
            return None;
        }
        self.state.armed = false;
        if !reason.is_fault() {
            info!("disarmed by operator");
        }
        Some(ArmingTransition::Disarmed(reason))
    }
}
