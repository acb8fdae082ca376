//! Motor driver state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use critical_section::Mutex;
use log::{debug, trace, warn};
use serde::Serialize;
use std::cell::Cell;
use std::sync::Arc;

// Internal
use super::{
    DisableReason, FaultStatus, MotorCommand, MotorDriverConfig, MotorDriverError, MotorHw,
    MotorHwError
};
use crate::control_loop::ControlLoop;
use crate::encoder::RpmSource;
use crate::failsafe::FailsafeCheck;
use crate::Rpm;
use util::maths::{clamp, clamp_checked, midpoint};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Target speed of a motor.
///
/// Shared between the driver and whichever contexts command the motor, see
/// [`MotorDriver::set_rpm_handle`]. The value is stored clamped and, if
/// configured, inverted.
pub struct SetRpm {
    min_rpm: Rpm,
    max_rpm: Rpm,
    invert_direction: bool,

    rpm: Mutex<Cell<Rpm>>
}

/// Drives a single motor.
///
/// The set rpm may be changed from any context through its [`SetRpm`]
/// handle, everything else belongs to the control task.
pub struct MotorDriver {
    hw: Box<dyn MotorHw>,

    config: MotorDriverConfig,

    encoder: Option<Arc<dyn RpmSource>>,
    control_loop: Option<Box<dyn ControlLoop<Rpm, Rpm>>>,
    failsafe: Option<Arc<dyn FailsafeCheck>>,

    log_key: String,

    disable_mask: u32,
    limp: bool,

    commanded_rpm: Rpm,
    set_rpm: Arc<SetRpm>
}

/// Snapshot of a motor driver's state for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotorStatus {
    pub set_rpm: Rpm,
    pub real_rpm: Rpm,
    pub commanded_rpm: Rpm,
    pub disabled: bool,
    pub disable_mask: u32,
    pub limp: bool,
    pub fault_status: FaultStatus
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SetRpm {
    fn new(config: &MotorDriverConfig) -> Self {
        let set_rpm = Self {
            min_rpm: config.min_rpm,
            max_rpm: config.max_rpm,
            invert_direction: config.invert_direction,
            rpm: Mutex::new(Cell::new(0))
        };
        set_rpm.brake();
        set_rpm
    }

    /// Change the target speed, returning `false` if it had to be clamped
    /// into the rpm range.
    pub fn change(&self, new_rpm: Rpm) -> bool {
        let (mut rpm, in_range) = clamp_checked(&new_rpm, &self.min_rpm, &self.max_rpm);

        if self.invert_direction {
            rpm = self.max_rpm + self.min_rpm - rpm;
        }

        critical_section::with(|cs| self.rpm.borrow(cs).set(rpm));

        in_range
    }

    /// Set the target speed to neutral.
    pub fn brake(&self) {
        self.change(self.get_neutral());
    }

    /// Target speed, after inversion.
    pub fn get(&self) -> Rpm {
        critical_section::with(|cs| self.rpm.borrow(cs).get())
    }

    pub fn get_neutral(&self) -> Rpm {
        midpoint(self.min_rpm, self.max_rpm)
    }
}

impl MotorDriver {
    /// Create a new driver for the given hardware.
    ///
    /// The driver starts enabled, in closed loop mode (if a loop is added),
    /// with the set and commanded rpms at neutral. Nothing is sent to the
    /// hardware until the first call to [`MotorDriver::proc`].
    pub fn new<H>(
        config: MotorDriverConfig,
        hw: H,
        log_key: &str
    ) -> Result<Self, MotorDriverError>
    where
        H: MotorHw + 'static
    {
        config.are_valid()?;

        let driver = Self {
            set_rpm: Arc::new(SetRpm::new(&config)),
            hw: Box::new(hw),
            config,
            encoder: None,
            control_loop: None,
            failsafe: None,
            log_key: log_key.to_string(),
            disable_mask: 0,
            limp: false,
            commanded_rpm: midpoint(config.min_commanded_rpm, config.max_commanded_rpm)
        };

        debug!(target: log_key, "Motor driver initialised: {:?}", config);

        Ok(driver)
    }

    /// Measure the motor's speed with the given source.
    pub fn with_encoder(mut self, encoder: Arc<dyn RpmSource>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Control the motor's speed with the given loop, which must map rpm onto
    /// the commanded range.
    pub fn with_control_loop(mut self, control_loop: Box<dyn ControlLoop<Rpm, Rpm>>) -> Self {
        self.control_loop = Some(control_loop);
        self
    }

    /// Keep the motor de-energised while the given check reports a failsafe.
    pub fn with_failsafe(mut self, failsafe: Arc<dyn FailsafeCheck>) -> Self {
        self.failsafe = Some(failsafe);
        self
    }

    /// Change the target speed of the motor.
    ///
    /// The speed is limited to the rpm range, returning `false` if it had to
    /// be clamped.
    pub fn change_set_rpm(&self, new_rpm: Rpm) -> bool {
        self.set_rpm.change(new_rpm)
    }

    /// Set the target speed to neutral.
    pub fn brake_motor(&self) {
        self.set_rpm.brake();
    }

    /// Handle on the target speed for use from other contexts.
    pub fn set_rpm_handle(&self) -> Arc<SetRpm> {
        self.set_rpm.clone()
    }

    /// Disable the motor for the given reason, de-energising it immediately.
    pub fn disable(&mut self, reason: DisableReason) {
        self.set_disable_reason(reason);

        if let Err(e) = self.hw.disable_motor() {
            warn!(target: self.log_key.as_str(), "Could not disable motor: {}", e);
        }
    }

    /// Set a disable reason without touching the hardware, leaving the motor
    /// to be de-energised by the next call to [`MotorDriver::proc`].
    pub fn set_disable_reason(&mut self, reason: DisableReason) {
        if self.disable_mask & reason.bit() == 0 {
            debug!(target: self.log_key.as_str(), "Disabled: {:?}", reason);
        }
        self.disable_mask |= reason.bit();
    }

    /// Clear a disable reason. The motor is only energised again by a later
    /// call to [`MotorDriver::proc`] once nothing disables it.
    pub fn enable(&mut self, reason: DisableReason) {
        if self.disable_mask & reason.bit() != 0 {
            debug!(target: self.log_key.as_str(), "Enabled: {:?}", reason);
        }
        self.disable_mask &= !reason.bit();
    }

    /// `true` if any disable reason is set or a failsafe is active.
    pub fn disabled(&self) -> bool {
        self.disable_mask != 0
            || self.failsafe.as_ref().map_or(false, |f| f.is_failsafe_active())
    }

    /// Cyclic processing.
    ///
    /// A disabled motor has its control loop reset and is de-energised.
    /// Otherwise the commanded rpm is computed from the set rpm, either
    /// through the control loop or, when limping or without a loop, by
    /// direct scaling, and then sent to the hardware.
    pub fn proc(&mut self) -> Result<(), MotorHwError> {
        if self.disabled() {
            let neutral_rpm = self.get_neutral_rpm();
            if let Some(ref mut control_loop) = self.control_loop {
                control_loop.reset(neutral_rpm);
            }
            self.change_commanded_rpm(self.get_neutral_commanded_rpm());

            return self.hw.disable_motor()
        }

        let set_rpm = self.get_set_rpm();
        let real_rpm = self.get_real_rpm();
        let neutral_rpm = self.get_neutral_rpm();
        let neutral_commanded_rpm = self.get_neutral_commanded_rpm();

        let commanded_rpm = match self.control_loop {
            Some(ref mut control_loop) if !self.limp => {
                control_loop.set_setpoint(set_rpm);
                let output = control_loop.proc(real_rpm);

                // Stopping is never left to the loop
                match set_rpm == neutral_rpm {
                    true => neutral_commanded_rpm,
                    false => output
                }
            },
            _ => self.commanded_from_set_rpm(set_rpm)
        };
        self.change_commanded_rpm(commanded_rpm);

        trace!(
            target: self.log_key.as_str(),
            "set_rpm: {}, real_rpm: {}, commanded_rpm: {}",
            set_rpm, real_rpm, self.commanded_rpm
        );

        let command = MotorCommand {
            set_rpm,
            commanded_rpm: self.commanded_rpm,
            min_commanded_rpm: self.config.min_commanded_rpm,
            neutral_commanded_rpm: self.get_neutral_commanded_rpm(),
            max_commanded_rpm: self.config.max_commanded_rpm
        };

        self.hw.command_motor(&command)
    }

    /// Measured speed of the motor, or the set rpm if there is no encoder.
    pub fn get_real_rpm(&self) -> Rpm {
        match self.encoder {
            Some(ref e) => e.get_rpm(),
            None => self.get_set_rpm()
        }
    }

    /// Bypass the control loop, scaling the set rpm directly.
    pub fn set_limp_mode(&mut self, limp: bool) {
        if limp != self.limp {
            warn!(
                target: self.log_key.as_str(),
                "Limp mode {}",
                if limp { "enabled" } else { "disabled" }
            );
        }
        self.limp = limp;
    }

    pub fn get_fault_status(&self) -> FaultStatus {
        self.hw.get_fault_status()
    }

    pub fn get_min_rpm(&self) -> Rpm {
        self.config.min_rpm
    }

    pub fn get_neutral_rpm(&self) -> Rpm {
        self.set_rpm.get_neutral()
    }

    pub fn get_max_rpm(&self) -> Rpm {
        self.config.max_rpm
    }

    pub fn get_min_commanded_rpm(&self) -> Rpm {
        self.config.min_commanded_rpm
    }

    pub fn get_neutral_commanded_rpm(&self) -> Rpm {
        midpoint(self.config.min_commanded_rpm, self.config.max_commanded_rpm)
    }

    pub fn get_max_commanded_rpm(&self) -> Rpm {
        self.config.max_commanded_rpm
    }

    /// Target speed, after inversion.
    pub fn get_set_rpm(&self) -> Rpm {
        self.set_rpm.get()
    }

    /// Command last sent to, or prepared for, the hardware.
    pub fn get_commanded_rpm(&self) -> Rpm {
        self.commanded_rpm
    }

    pub fn get_disable_mask(&self) -> u32 {
        self.disable_mask
    }

    pub fn is_limp(&self) -> bool {
        self.limp
    }

    pub fn log_key(&self) -> &str {
        &self.log_key
    }

    pub fn status(&self) -> MotorStatus {
        MotorStatus {
            set_rpm: self.get_set_rpm(),
            real_rpm: self.get_real_rpm(),
            commanded_rpm: self.commanded_rpm,
            disabled: self.disabled(),
            disable_mask: self.disable_mask,
            limp: self.limp,
            fault_status: self.get_fault_status()
        }
    }

    fn change_commanded_rpm(&mut self, new_rpm: Rpm) {
        self.commanded_rpm = clamp(
            &new_rpm,
            &self.config.min_commanded_rpm,
            &self.config.max_commanded_rpm
        );
    }

    /// Scale a set rpm into the commanded range. Each side of neutral is
    /// scaled separately, so asymmetric ranges still meet at neutral.
    fn commanded_from_set_rpm(&self, set_rpm: Rpm) -> Rpm {
        let neutral = self.get_neutral_rpm() as i64;
        let neutral_commanded = self.get_neutral_commanded_rpm() as i64;

        let (set_range, commanded_range) = if set_rpm as i64 > neutral {
            (
                self.config.max_rpm as i64 - neutral,
                self.config.max_commanded_rpm as i64 - neutral_commanded
            )
        }
        else if (set_rpm as i64) < neutral {
            (
                self.config.min_rpm as i64 - neutral,
                self.config.min_commanded_rpm as i64 - neutral_commanded
            )
        }
        else {
            return neutral_commanded as Rpm
        };

        if set_range == 0 {
            return neutral_commanded as Rpm
        }

        let offset = set_rpm as i64 - neutral;
        (neutral_commanded + offset * commanded_range / set_range) as Rpm
    }
}

impl std::fmt::Debug for MotorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorDriver")
            .field("log_key", &self.log_key)
            .field("config", &self.config)
            .field("has_encoder", &self.encoder.is_some())
            .field("has_control_loop", &self.control_loop.is_some())
            .field("has_failsafe", &self.failsafe.is_some())
            .field("disable_mask", &self.disable_mask)
            .field("limp", &self.limp)
            .field("set_rpm", &self.get_set_rpm())
            .field("commanded_rpm", &self.commanded_rpm)
            .finish()
    }
}
