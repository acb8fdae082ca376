//! Parameters structure for the drive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::control_loop::PidGains;
use crate::drive_strategy::{DriveStrategyKind, DEFAULT_DEADZONE};
use crate::motor_driver::MotorDriverConfig;
use crate::rc::{RcChannel, RcValue};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drive.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- MOTORS ----

    pub left_motor: MotorDriverConfig,

    pub right_motor: MotorDriverConfig,

    /// Gains of the speed loop on each motor. Without gains the motors run
    /// open loop.
    #[serde(default)]
    pub pid_gains: Option<PidGains>,

    /// Start both motors in limp mode, bypassing the speed loop.
    #[serde(default)]
    pub force_limp: bool,

    // ---- STRATEGY ----

    pub strategy: DriveStrategyKind,

    /// Arcade throttle channel.
    #[serde(default = "invalid_channel")]
    pub throttle_channel: RcChannel,

    /// Arcade steering channel.
    #[serde(default = "invalid_channel")]
    pub steering_channel: RcChannel,

    /// Tank left side channel.
    #[serde(default = "invalid_channel")]
    pub left_channel: RcChannel,

    /// Tank right side channel.
    #[serde(default = "invalid_channel")]
    pub right_channel: RcChannel,

    /// Half width of the neutral band around the stick centre.
    ///
    /// Units: raw channel value
    #[serde(default = "default_deadzone")]
    pub deadzone: RcValue
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn invalid_channel() -> RcChannel {
    RcChannel::INVALID
}

fn default_deadzone() -> RcValue {
    DEFAULT_DEADZONE
}
