//! Motor driver configuration

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::MotorDriverError;
use crate::Rpm;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default magnitude of the rpm and commanded rpm limits.
pub const DEFAULT_MAX_RPM: Rpm = 1024;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limits and options of a motor driver.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct MotorDriverConfig {
    /// Swap the direction of the motor.
    #[serde(default)]
    pub invert_direction: bool,

    /// Lowest (most negative) set rpm.
    ///
    /// Units: rpm
    pub min_rpm: Rpm,

    /// Highest set rpm.
    ///
    /// Units: rpm
    pub max_rpm: Rpm,

    /// Lowest command sent to the hardware.
    ///
    /// Units: hardware specific, for example PWM counts
    pub min_commanded_rpm: Rpm,

    /// Highest command sent to the hardware.
    ///
    /// Units: hardware specific, for example PWM counts
    pub max_commanded_rpm: Rpm
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotorDriverConfig {
    fn default() -> Self {
        Self {
            invert_direction: false,
            min_rpm: -DEFAULT_MAX_RPM,
            max_rpm: DEFAULT_MAX_RPM,
            min_commanded_rpm: -DEFAULT_MAX_RPM,
            max_commanded_rpm: DEFAULT_MAX_RPM
        }
    }
}

impl MotorDriverConfig {
    pub fn are_valid(&self) -> Result<(), MotorDriverError> {
        if self.min_rpm > self.max_rpm {
            return Err(MotorDriverError::InvalidRpmRange(self.min_rpm, self.max_rpm))
        }
        if self.min_commanded_rpm > self.max_commanded_rpm {
            return Err(MotorDriverError::InvalidCommandedRange(
                self.min_commanded_rpm, self.max_commanded_rpm
            ))
        }

        Ok(())
    }
}
