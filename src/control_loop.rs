// src/control_loop.rs

//! # Control Loop
//!
//! [`FlightController`] owns every flight component and runs them once per
//! [`tick`](FlightController::tick):
//!
//! 1. read the attitude estimator, or feed the accelerometer calibration
//!    while one is running,
//! 2. apply the latest operator setpoint and poll the link timeout,
//! 3. disarm on a critical attitude,
//! 4. run the active behavior and the mixer while armed, otherwise reset
//!    the behavior and stop the motors,
//! 5. write the motor duties.
//!
//! The caller paces the loop (nominally 1 kHz) and persists a completed
//! calibration reported in the [`TickOutcome`].

use log::{error, info, warn};
use nalgebra::Vector3;

use crate::behavior::{
    AcrobaticBehavior, ActiveBehavior, BehaviorKind, FlightBehavior, ManualBehavior,
};
use crate::config::FlightConfig;
use crate::error::{Error, Peripheral};
use crate::estimator::calibration::{
    AccelCalibrationStep, CalibrationError, CalibrationParameters,
};
use crate::estimator::{AttitudeEstimator, OrientationEstimate};
use crate::hal::{Actuator, Clock, ImuSensor, Platform};
use crate::link::{CommandLink, MenuEvent};
use crate::mixer::{mix, ControlVector, MotorCommand};
use crate::pid::AxisControllerConfig;
use crate::safety::{ArmingSupervisor, ArmingTransition};
use crate::settings::{
    load_settings, save_settings, Storage, CALIBRATION_KEY, ROLL_PITCH_GAINS_KEY, YAW_GAINS_KEY,
};
use crate::time::Chronometer;

/// Progress of the accelerometer calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationEvent {
    /// An orientation is done. The operator turns the vehicle and resumes.
    OrientationCollected {
        /// Orientation sampled after resuming.
        next_orientation: u8,
    },
    /// The sweep finished with new parameters, ready to be saved.
    Completed(CalibrationParameters),
    /// The sweep failed, the previous parameters stay in use.
    Failed(CalibrationError),
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Armed flag after the tick.
    pub armed: bool,
    /// Control vector fed to the mixer, zero while disarmed.
    pub control: ControlVector,
    /// Duties written to the motors.
    pub motors: MotorCommand,
    /// Attitude estimate, `None` while calibrating the accelerometer.
    pub estimate: Option<OrientationEstimate>,
    /// Arming change, if any.
    pub transition: Option<ArmingTransition>,
    /// Calibration progress, if any.
    pub calibration: Option<CalibrationEvent>,
}

/// The flight controller.
pub struct FlightController<'a, S, A, C> {
    config: FlightConfig,
    link: &'a CommandLink,
    estimator: AttitudeEstimator<S>,
    motors: A,
    clock: C,
    chronometer: Chronometer,
    supervisor: ArmingSupervisor,
    behavior: ActiveBehavior,
    roll_pitch_gains: AxisControllerConfig,
    yaw_gains: AxisControllerConfig,
}

impl<'a, S, A, C> FlightController<'a, S, A, C>
where
    S: ImuSensor,
    A: Actuator,
    C: Clock,
{
    /// Initializes the peripherals, loads the stored settings and binds the
    /// acrobatic behavior.
    ///
    /// Without a usable stored calibration the gyro is calibrated right away
    /// (the vehicle must stand still) and an accelerometer calibration is
    /// started. Peripheral failures are returned and must not be flown
    /// through, see [`halt_and_restart`].
    pub fn boot<St: Storage + ?Sized>(
        config: FlightConfig,
        link: &'a CommandLink,
        sensor: S,
        mut motors: A,
        mut clock: C,
        storage: &mut St,
    ) -> Result<Self, Error> {
        info!("motors init");
        motors.init().map_err(|e| {
            error!("motors init failed: {:?}", e);
            Error::PeripheralInit(Peripheral::Motors)
        })?;

        let stored_calibration = load_settings::<CalibrationParameters, _>(storage, CALIBRATION_KEY)
            .ok()
            .filter(|calibration| {
                let valid = calibration.is_valid();
                if !valid {
                    warn!("stored calibration rejected");
                }
                valid
            });
        if !config.roll_pitch_gains.is_valid() || !config.yaw_gains.is_valid() {
            error!("configured rate gains are invalid");
            return Err(Error::InvalidGains);
        }
        let roll_pitch_gains = load_gains(storage, ROLL_PITCH_GAINS_KEY, config.roll_pitch_gains);
        let yaw_gains = load_gains(storage, YAW_GAINS_KEY, config.yaw_gains);

        let mut estimator = AttitudeEstimator::new(
            sensor,
            config.estimator,
            stored_calibration.unwrap_or_default(),
        );
        estimator.init()?;

        let now = clock.now();
        let mut controller = Self {
            config,
            link,
            estimator,
            motors,
            clock,
            chronometer: Chronometer::new(now),
            supervisor: ArmingSupervisor::new(config.link_timeout, config.critical_angle),
            behavior: ActiveBehavior::Acrobatic(AcrobaticBehavior::new(
                config.acrobatic,
                roll_pitch_gains,
                yaw_gains,
            )),
            roll_pitch_gains,
            yaw_gains,
        };
        controller.write_motors(&MotorCommand::IDLE);

        if stored_calibration.is_none() {
            warn!("no stored calibration, recalibrating");
            controller.calibrate_gyro()?;
            controller.start_accel_calibration()?;
        }

        info!("Start!");
        Ok(controller)
    }

    /// Runs one iteration of the control loop.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        let dt = self.chronometer.lap(now);
        let snapshot = self.link.snapshot();

        let mut estimate = None;
        let mut calibration = None;
        if self.estimator.is_accel_calibration_active() {
            calibration = self.update_accel_calibration();
        } else {
            estimate = Some(self.estimator.read(dt));
        }

        // Arming is gated on the attitude, so a tick never both arms and
        // disarms.
        let arming_allowed = estimate
            .as_ref()
            .is_some_and(|current| self.supervisor.is_attitude_safe(current));
        let mut transition = self.supervisor.observe_command(&snapshot, now, arming_allowed);
        if let Some(timeout) = self.supervisor.poll_timeout(now) {
            transition = Some(timeout);
        }
        if let Some(current) = &estimate {
            if let Some(critical) = self.supervisor.check_attitude(current) {
                transition = Some(critical);
            }
        }

        let control = match estimate {
            Some(current) if self.supervisor.is_armed() => {
                self.behavior.interpret(&snapshot.setpoint, dt, &current)
            }
            _ => {
                self.behavior.on_disarm();
                ControlVector::ZERO
            }
        };
        let motors = mix(control);
        self.write_motors(&motors);

        TickOutcome {
            armed: self.supervisor.is_armed(),
            control,
            motors,
            estimate,
            transition,
            calibration,
        }
    }

    fn update_accel_calibration(&mut self) -> Option<CalibrationEvent> {
        if !self.estimator.is_collecting_accel() {
            return None;
        }

        let event = match self.estimator.update_accel_calibration() {
            Ok(None) | Ok(Some(AccelCalibrationStep::Sampling)) => return None,
            Ok(Some(AccelCalibrationStep::OrientationCollected { next_orientation })) => {
                info!("orientation collected, turn to orientation {}", next_orientation);
                CalibrationEvent::OrientationCollected { next_orientation }
            }
            Ok(Some(AccelCalibrationStep::Completed)) => {
                CalibrationEvent::Completed(*self.estimator.calibration())
            }
            Err(e) => {
                warn!("accel calibration failed: {}", e);
                self.estimator.reset();
                CalibrationEvent::Failed(e)
            }
        };
        self.link.push_menu_event(MenuEvent::Refresh);
        Some(event)
    }

    fn write_motors(&mut self, command: &MotorCommand) {
        for (channel, duty) in command.duties().iter().enumerate() {
            self.motors.set_duty(channel, *duty);
        }
    }

    fn ensure_disarmed(&self) -> Result<(), Error> {
        if self.supervisor.is_armed() {
            warn!("refused while armed");
            return Err(Error::Armed);
        }
        Ok(())
    }

    /// Whether actuation is permitted.
    pub fn is_armed(&self) -> bool {
        self.supervisor.is_armed()
    }

    /// Arming state machine.
    pub fn supervisor(&self) -> &ArmingSupervisor {
        &self.supervisor
    }

    /// Attitude estimator.
    pub fn estimator(&self) -> &AttitudeEstimator<S> {
        &self.estimator
    }

    /// Active configuration.
    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    /// Bound behavior.
    pub fn behavior_kind(&self) -> BehaviorKind {
        self.behavior.kind()
    }

    /// Binds a behavior. The outgoing behavior is reset first; selecting
    /// the bound behavior does nothing.
    pub fn select_behavior(&mut self, kind: BehaviorKind) {
        if kind == self.behavior.kind() {
            return;
        }
        self.behavior.on_disarm();
        self.behavior = match kind {
            BehaviorKind::Manual => ActiveBehavior::Manual(ManualBehavior),
            BehaviorKind::Acrobatic => ActiveBehavior::Acrobatic(AcrobaticBehavior::new(
                self.config.acrobatic,
                self.roll_pitch_gains,
                self.yaw_gains,
            )),
        };
        info!("behavior {:?} bound", kind);
    }

    /// Switches between manual and acrobatic. Returns the new behavior.
    pub fn toggle_behavior(&mut self) -> BehaviorKind {
        let next = match self.behavior.kind() {
            BehaviorKind::Manual => BehaviorKind::Acrobatic,
            BehaviorKind::Acrobatic => BehaviorKind::Manual,
        };
        self.select_behavior(next);
        next
    }

    /// Current roll/pitch and yaw rate gains.
    pub fn gains(&self) -> (AxisControllerConfig, AxisControllerConfig) {
        (self.roll_pitch_gains, self.yaw_gains)
    }

    /// Replaces the rate gains. The acrobatic controllers start over.
    ///
    /// Malformed gains are refused and the current ones stay in use.
    pub fn set_gains(
        &mut self,
        roll_pitch_gains: AxisControllerConfig,
        yaw_gains: AxisControllerConfig,
    ) -> Result<(), Error> {
        if !roll_pitch_gains.is_valid() || !yaw_gains.is_valid() {
            warn!("rate gains rejected");
            return Err(Error::InvalidGains);
        }
        self.roll_pitch_gains = roll_pitch_gains;
        self.yaw_gains = yaw_gains;
        if let Some(acrobatic) = self.behavior.acrobatic_mut() {
            acrobatic.set_gains(roll_pitch_gains, yaw_gains);
        }
        Ok(())
    }

    /// Blocking gyro calibration. The vehicle must be disarmed and still.
    pub fn calibrate_gyro(&mut self) -> Result<Vector3<f32>, Error> {
        self.ensure_disarmed()?;
        let bias = self
            .estimator
            .calibrate_gyro(self.config.gyro_calibration_samples)?;
        self.chronometer = Chronometer::new(self.clock.now());
        Ok(bias)
    }

    /// Starts the accelerometer sweep. Arming is refused until it ends.
    pub fn start_accel_calibration(&mut self) -> Result<(), Error> {
        self.ensure_disarmed()?;
        self.estimator.start_accel_calibration();
        self.link.push_menu_event(MenuEvent::Refresh);
        Ok(())
    }

    /// Continues the sweep after the vehicle was turned.
    pub fn resume_accel_calibration(&mut self) -> Result<(), Error> {
        self.ensure_disarmed()?;
        self.estimator.resume_accel_calibration();
        Ok(())
    }

    /// Abandons the sweep and keeps the previous parameters.
    pub fn cancel_accel_calibration(&mut self) {
        self.estimator.cancel_accel_calibration();
        self.estimator.reset();
    }

    /// Stores the active calibration.
    pub fn save_calibration<St: Storage + ?Sized>(&self, storage: &mut St) -> Result<(), Error> {
        save_settings(storage, CALIBRATION_KEY, self.estimator.calibration())?;
        Ok(())
    }

    /// Stores the rate gains.
    pub fn save_gains<St: Storage + ?Sized>(&self, storage: &mut St) -> Result<(), Error> {
        save_settings(storage, ROLL_PITCH_GAINS_KEY, &self.roll_pitch_gains)?;
        save_settings(storage, YAW_GAINS_KEY, &self.yaw_gains)?;
        Ok(())
    }
}

fn load_gains<St: Storage + ?Sized>(
    storage: &mut St,
    key: &str,
    default: AxisControllerConfig,
) -> AxisControllerConfig {
    match load_settings::<AxisControllerConfig, _>(storage, key) {
        Ok(gains) if gains.is_valid() => gains,
        Ok(_) => {
            warn!("stored gains {} rejected, using defaults", key);
            default
        }
        Err(_) => default,
    }
}

/// Logs a fatal error, waits `delay_ms` and restarts the device.
pub fn halt_and_restart<P: Platform + ?Sized>(platform: &mut P, error: &Error, delay_ms: u32) -> ! {
    error!("Fatal error: {}! Restart after {} ms", error, delay_ms);
    platform.delay_ms(delay_ms);
    platform.restart()
}
