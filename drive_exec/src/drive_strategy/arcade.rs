//! Arcade drive, one channel for throttle and one for steering

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use std::sync::Arc;

use super::{drive_motor, rpm_from_rc_value, DriveStrategy, DEFAULT_DEADZONE, LOG_KEY};
use crate::failsafe::FailsafeCheck;
use crate::motor_driver::{DisableReason, MotorDriver};
use crate::rc::{self, RcChannel, RcChannelProvider, RcValue};
use crate::Rpm;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arcade drive.
///
/// Throttle drives both sides together, steering is added to the left side
/// and taken from the right.
pub struct Arcade {
    throttle_channel: RcChannel,
    steering_channel: RcChannel,
    deadzone: RcValue,
    failsafe: Option<Arc<dyn FailsafeCheck>>,

    /// Whether the last cycle had usable input, to log changes.
    inputs_valid: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Arcade {
    pub fn new(throttle_channel: RcChannel, steering_channel: RcChannel) -> Self {
        Self {
            throttle_channel,
            steering_channel,
            deadzone: DEFAULT_DEADZONE,
            failsafe: None,
            inputs_valid: false
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

    fn mix(
        &self,
        throttle: RcValue,
        steering: RcValue,
        left: &MotorDriver,
        right: &MotorDriver
    ) -> (Rpm, Rpm) {
        let left_turn = rpm_from_rc_value(steering, self.deadzone, left) - left.get_neutral_rpm();
        let right_turn = rpm_from_rc_value(steering, self.deadzone, right) - right.get_neutral_rpm();

        let left_rpm = rpm_from_rc_value(throttle, self.deadzone, left) + left_turn;
        let right_rpm = rpm_from_rc_value(throttle, self.deadzone, right) - right_turn;

        (
            clamp(&left_rpm, &left.get_min_rpm(), &left.get_max_rpm()),
            clamp(&right_rpm, &right.get_min_rpm(), &right.get_max_rpm())
        )
    }
}

impl DriveStrategy for Arcade {
    fn name(&self) -> &'static str {
        "arcade"
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

        let throttle = rc::get_valid_value(rc, self.throttle_channel);
        let steering = rc::get_valid_value(rc, self.steering_channel);

        match (throttle, steering) {
            (Some(t), Some(s)) => {
                if !self.inputs_valid {
                    info!(target: LOG_KEY, "Arcade inputs valid");
                    self.inputs_valid = true;
                }

                let (left_rpm, right_rpm) = self.mix(t, s, left, right);
                drive_motor(left, left_rpm);
                drive_motor(right, right_rpm);
            },
            _ => {
                if self.inputs_valid {
                    warn!(
                        target: LOG_KEY,
                        "Arcade inputs invalid (throttle: {:?}, steering: {:?}), stopping",
                        throttle, steering
                    );
                    self.inputs_valid = false;
                }

                left.disable(DisableReason::DriveStrategy);
                right.disable(DisableReason::DriveStrategy);
            }
        }
    }
}
