//! Tank drive, one channel per side

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use std::sync::Arc;

use super::{drive_motor, rpm_from_rc_value, DriveStrategy, DEFAULT_DEADZONE, LOG_KEY};
use crate::failsafe::FailsafeCheck;
use crate::motor_driver::{DisableReason, MotorDriver};
use crate::rc::{self, RcChannel, RcChannelProvider, RcValue};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tank drive. Each side runs from its own channel and is stopped on its own
/// when that channel is invalid.
pub struct Tank {
    left_channel: RcChannel,
    right_channel: RcChannel,
    deadzone: RcValue,
    failsafe: Option<Arc<dyn FailsafeCheck>>,

    left_valid: bool,
    right_valid: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tank {
    pub fn new(left_channel: RcChannel, right_channel: RcChannel) -> Self {
        Self {
            left_channel,
            right_channel,
            deadzone: DEFAULT_DEADZONE,
            failsafe: None,
            left_valid: true,
            right_valid: true
        }
    }

    pub fn with_deadzone(mut self, deadzone: RcValue) -> Self {
        self.deadzone = deadzone;
        self
    }

    /// Stop both motors while the given check reports a failsafe.
    pub fn with_failsafe(mut self, failsafe: Arc<dyn FailsafeCheck>) -> Self {
        self.failsafe = Some(failsafe);
        self
    }
}

impl DriveStrategy for Tank {
    fn name(&self) -> &'static str {
        "tank"
    }

    fn proc(
        &mut self,
        left: &mut MotorDriver,
        right: &mut MotorDriver,
        rc: &dyn RcChannelProvider
    ) {
        if self.failsafe.as_ref().map_or(false, |f| f.is_failsafe_active()) {
            left.disable(DisableReason::DriveStrategy);
            right.disable(DisableReason::DriveStrategy);
            return;
        }

        self.left_valid = proc_side(
            "left", rc::get_valid_value(rc, self.left_channel), self.deadzone, left, self.left_valid
        );
        self.right_valid = proc_side(
            "right", rc::get_valid_value(rc, self.right_channel), self.deadzone, right, self.right_valid
        );
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Drive one side from its channel value, returning whether it was valid.
fn proc_side(
    side: &str,
    value: Option<RcValue>,
    deadzone: RcValue,
    motor: &mut MotorDriver,
    was_valid: bool
) -> bool {
    match value {
        Some(v) => {
            let rpm = rpm_from_rc_value(v, deadzone, motor);
            drive_motor(motor, rpm);
            true
        },
        None => {
            if was_valid {
                warn!(target: LOG_KEY, "Tank {} input invalid, stopping {} side", side, side);
            }
            motor.disable(DisableReason::DriveStrategy);
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_strategy::test_utils::{motor, Sticks};

    const LEFT: u8 = 1;
    const RIGHT: u8 = 3;

    #[test]
    fn test_sides_are_independent() {
        let (mut l, mut r) = (motor("left"), motor("right"));
        let sticks = Sticks::new();
        let mut strategy = Tank::new(RcChannel(LEFT), RcChannel(RIGHT));

        sticks.set(LEFT, Some(1811));
        sticks.set(RIGHT, Some(172));
        strategy.proc(&mut l, &mut r, &sticks);
        assert_eq!((l.get_set_rpm(), r.get_set_rpm()), (1024, -1024));

        sticks.set(RIGHT, None);
        strategy.proc(&mut l, &mut r, &sticks);
        assert!(!l.disabled());
        assert!(r.disabled());
        assert_eq!(l.get_set_rpm(), 1024);

        sticks.set(RIGHT, Some(991));
        strategy.proc(&mut l, &mut r, &sticks);
        assert!(!r.disabled());
        assert_eq!(r.get_set_rpm(), 0);
    }

    #[test]
    fn test_invalid_channel_number() {
        let (mut l, mut r) = (motor("left"), motor("right"));
        let sticks = Sticks::new();
        let mut strategy = Tank::new(RcChannel::INVALID, RcChannel(RIGHT));

        strategy.proc(&mut l, &mut r, &sticks);
        assert!(l.disabled());
        assert!(!r.disabled());
    }
}
