//! # Drive strategy module
//!
//! A drive strategy turns radio control stick positions into target speeds
//! for the left and right motors. Strategies only ever change set rpms and
//! the `DriveStrategy` disable reason, the motors themselves are processed
//! separately by the control task.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod arcade;
mod tank;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
pub use arcade::*;
pub use tank::*;
use crate::motor_driver::{DisableReason, MotorDriver};
use crate::rc::{RcChannelProvider, RcValue, RC_CH_CENTER_VALUE, RC_CH_MAX_VALUE, RC_CH_MIN_VALUE};
use crate::Rpm;
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default half width of the band around the stick centre which is treated
/// as neutral.
pub const DEFAULT_DEADZONE: RcValue = 50;

/// Log key for drive strategy records.
pub const LOG_KEY: &str = "drive_strategy";

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A mapping from radio control input to motor set rpms.
pub trait DriveStrategy: Send {
    /// Short name of the strategy.
    fn name(&self) -> &'static str;

    /// Cyclic processing, updating the set rpm and `DriveStrategy` disable
    /// reason of both motors.
    fn proc(
        &mut self,
        left: &mut MotorDriver,
        right: &mut MotorDriver,
        rc: &dyn RcChannelProvider
    );
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The available drive strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DriveStrategyKind {
    /// One stick for throttle and another for steering.
    Arcade,

    /// One stick per side.
    Tank
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Target speed for a motor from a valid channel value.
///
/// Values within `deadzone` of the stick centre (inclusive) map to the
/// motor's neutral rpm, anything else maps linearly from the full channel
/// range onto the motor's rpm range.
pub fn rpm_from_rc_value(value: RcValue, deadzone: RcValue, motor: &MotorDriver) -> Rpm {
    let value = value as Rpm;
    let center = RC_CH_CENTER_VALUE as Rpm;
    let deadzone = deadzone as Rpm;

    if value >= center - deadzone && value <= center + deadzone {
        return motor.get_neutral_rpm()
    }

    lin_map(
        (RC_CH_MIN_VALUE as Rpm, RC_CH_MAX_VALUE as Rpm),
        (motor.get_min_rpm(), motor.get_max_rpm()),
        value
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Set a motor's target speed and allow it to run.
fn drive_motor(motor: &mut MotorDriver, rpm: Rpm) {
    motor.change_set_rpm(rpm);
    motor.enable(DisableReason::DriveStrategy);
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::motor_driver::{MotorDriverConfig, VirtualMotor};
    use crate::rc::RcChannel;
    use std::cell::RefCell;

    /// Radio control input with settable channels 1 to 8.
    pub struct Sticks(pub RefCell<[Option<RcValue>; 8]>);

    impl Sticks {
        pub fn new() -> Self {
            Self(RefCell::new([Some(RC_CH_CENTER_VALUE); 8]))
        }

        pub fn set(&self, channel: u8, value: Option<RcValue>) {
            self.0.borrow_mut()[channel as usize - 1] = value;
        }
    }

    impl RcChannelProvider for Sticks {
        fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue> {
            channel.index().and_then(|i| self.0.borrow().get(i).copied().flatten())
        }
    }

    pub fn motor(name: &str) -> MotorDriver {
        MotorDriver::new(MotorDriverConfig::default(), VirtualMotor::new(name), name).unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::test_utils::motor;

    #[test]
    fn test_rpm_from_rc_value() {
        let m = motor("test");

        assert_eq!(rpm_from_rc_value(RC_CH_CENTER_VALUE, DEFAULT_DEADZONE, &m), 0);
        assert_eq!(rpm_from_rc_value(RC_CH_MAX_VALUE, DEFAULT_DEADZONE, &m), 1024);
        assert_eq!(rpm_from_rc_value(RC_CH_MIN_VALUE, DEFAULT_DEADZONE, &m), -1024);

        // Deadzone edges are inclusive
        assert_eq!(rpm_from_rc_value(1041, DEFAULT_DEADZONE, &m), 0);
        assert_eq!(rpm_from_rc_value(941, DEFAULT_DEADZONE, &m), 0);
        assert_eq!(rpm_from_rc_value(1042, DEFAULT_DEADZONE, &m), 63);
        assert_eq!(rpm_from_rc_value(1042, 0, &m), 63);
    }
}
