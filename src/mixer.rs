// src/mixer.rs

//! # X-Frame Motor Mixer
//!
//! Maps a thrust/roll/pitch/yaw control vector onto the four rotors of an
//! X-frame quadrotor. Positive roll raises the left rotors, positive pitch
//! raises the back rotors and positive yaw favours the counter-clockwise
//! pair (back-left, front-right).
//!
//! Saturation is handled by clipping each rotor to `[0, 1]` independently;
//! the command is never rescaled to preserve the ratio between axes.

/// Physical motor positions, in output channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorIndex {
    /// M0, spins counter-clockwise.
    BackLeft = 0,
    /// M1, spins clockwise.
    BackRight = 1,
    /// M2, spins counter-clockwise.
    FrontRight = 2,
    /// M3, spins clockwise.
    FrontLeft = 3,
}

/// Number of rotors on the frame.
pub const MOTOR_COUNT: usize = 4;

/// Corrective actuation for one tick, before mixing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlVector {
    /// Collective thrust, nominally `[0, 1]`.
    pub thrust: f32,
    /// Roll command.
    pub roll: f32,
    /// Pitch command.
    pub pitch: f32,
    /// Yaw command.
    pub yaw: f32,
}

impl ControlVector {
    /// All channels at zero.
    pub const ZERO: Self = Self {
        thrust: 0.0,
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };
}

/// Duty cycle per motor in `[0, 1]`, indexed by [`MotorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommand(pub [f32; MOTOR_COUNT]);

impl MotorCommand {
    /// Every motor stopped.
    pub const IDLE: Self = Self([0.0; MOTOR_COUNT]);

    /// Duty of one motor.
    pub fn duty(&self, motor: MotorIndex) -> f32 {
        self.0[motor as usize]
    }

    /// Duties in channel order.
    pub fn duties(&self) -> &[f32; MOTOR_COUNT] {
        &self.0
    }
}

/// Clamps a duty to `[0, 1]`. NaN maps to zero.
fn saturate(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Mixes a control vector into per-motor duties.
pub fn mix(control: ControlVector) -> MotorCommand {
    let ControlVector {
        thrust,
        roll,
        pitch,
        yaw,
    } = control;

    let mut duties = [0.0; MOTOR_COUNT];
    duties[MotorIndex::FrontLeft as usize] = saturate(thrust + roll - pitch - yaw);
    duties[MotorIndex::FrontRight as usize] = saturate(thrust - roll - pitch + yaw);
    duties[MotorIndex::BackLeft as usize] = saturate(thrust + roll + pitch + yaw);
    duties[MotorIndex::BackRight as usize] = saturate(thrust - roll + pitch - yaw);

    MotorCommand(duties)
}
