//! # Motor driver module
//!
//! A motor driver takes a target speed (the set rpm) and turns it into a
//! command for the motor hardware (the commanded rpm), either through a
//! closed control loop on the measured speed or by direct scaling. Motors can
//! be disabled for several independent reasons and only run once all of them
//! are cleared and no failsafe is active.
//!
//! Hardware is reached through the [`MotorHw`] trait. Two backends are
//! provided, [`VirtualMotor`] for bench runs and [`HBridgeMotor`] for a PWM
//! driven H-bridge.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod hbridge;
mod params;
mod state;
mod virtual_motor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use thiserror::Error;

// Internal
pub use hbridge::*;
pub use params::*;
pub use state::*;
pub use virtual_motor::*;
use crate::Rpm;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Hardware behind a motor driver.
///
/// The driver calls exactly one of `disable_motor` or `command_motor` on each
/// cycle, and never re-entrantly.
pub trait MotorHw: Send {
    /// De-energise the motor.
    fn disable_motor(&mut self) -> Result<(), MotorHwError>;

    /// Energise the motor at the given command.
    fn command_motor(&mut self, command: &MotorCommand) -> Result<(), MotorHwError>;

    /// Report the hardware's fault status, if it can tell.
    fn get_fault_status(&self) -> FaultStatus {
        FaultStatus::Unknown
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command sent to motor hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotorCommand {
    /// Speed requested of the driver.
    pub set_rpm: Rpm,

    /// Command to apply, within the commanded range below.
    pub commanded_rpm: Rpm,

    pub min_commanded_rpm: Rpm,
    pub neutral_commanded_rpm: Rpm,
    pub max_commanded_rpm: Rpm
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons for disabling a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DisableReason {
    /// Emergency stop.
    EStop = 0,

    /// Requested by the drive strategy.
    DriveStrategy = 1,

    /// Motor driver fault.
    Fault = 2
}

/// Fault status reported by motor hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultStatus {
    /// Operational with no faults.
    None,

    /// Faulty for a generic reason.
    Fault,

    OverCurrent,
    OverVoltage,
    OverTemp,

    /// Status cannot be determined.
    Unknown
}

/// Errors raised by motor hardware.
#[derive(Debug, Error, PartialEq)]
pub enum MotorHwError {
    #[error("Could not write to the {0} pin")]
    PinWrite(&'static str),

    #[error("Could not read the {0} pin")]
    PinRead(&'static str)
}

/// Errors in the construction of a motor driver.
#[derive(Debug, Error, PartialEq)]
pub enum MotorDriverError {
    #[error("The rpm range is empty, min ({0}) is greater than max ({1})")]
    InvalidRpmRange(Rpm, Rpm),

    #[error("The commanded rpm range is empty, min ({0}) is greater than max ({1})")]
    InvalidCommandedRange(Rpm, Rpm),

    #[error("Hardware error during initialisation: {0}")]
    HwError(MotorHwError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DisableReason {
    /// The bit for this reason in the disable mask.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl FaultStatus {
    /// `true` if the hardware is known to be in a faulty state.
    pub fn is_faulty(self) -> bool {
        !matches!(self, FaultStatus::None | FaultStatus::Unknown)
    }
}

impl From<MotorHwError> for MotorDriverError {
    fn from(e: MotorHwError) -> Self {
        MotorDriverError::HwError(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_faulty() {
        assert!(!FaultStatus::None.is_faulty());
        assert!(!FaultStatus::Unknown.is_faulty());
        assert!(FaultStatus::Fault.is_faulty());
        assert!(FaultStatus::OverCurrent.is_faulty());
        assert!(FaultStatus::OverVoltage.is_faulty());
        assert!(FaultStatus::OverTemp.is_faulty());
    }

    #[test]
    fn test_disable_bits() {
        assert_eq!(DisableReason::EStop.bit(), 0b001);
        assert_eq!(DisableReason::DriveStrategy.bit(), 0b010);
        assert_eq!(DisableReason::Fault.bit(), 0b100);
    }
}
