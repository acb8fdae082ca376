//! Arm switch processing.
//!
//! The arm switch is a radio control channel which must be held above
//! [`ARM_SWITCH_THRESHOLD`] for the robot to be armed. The switch must also
//! have been seen in the disarmed position before it can arm, and after any
//! long or frequently repeated loss of radio control it must be cycled again.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use std::sync::Arc;

use super::{FailsafeMask, FailsafeReason, LOG_KEY};
use crate::rc::{self, RcChannel, RcChannelProvider, RcValue, RC_CH_MAX_VALUE};
use util::time::{Clock, TimeMs};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Channel value above which the arm switch is on.
pub const ARM_SWITCH_THRESHOLD: RcValue = ((RC_CH_MAX_VALUE as u32 * 90) / 100) as RcValue;

/// Time a radio control failsafe may last before the arm switch must be
/// cycled.
///
/// Units: milliseconds
pub const REARM_TIMEOUT_MS: TimeMs = 200;

/// Number of self-correcting radio control failsafes after which the arm
/// switch must be cycled.
pub const REPEAT_REARM_THRESHOLD: u32 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm switch state machine.
pub struct ArmSwitch {
    channel: RcChannel,

    mask: Arc<FailsafeMask>,
    clock: Arc<dyn Clock>,

    /// Start of the current radio control interruption, if any.
    interruption_start_ms: Option<TimeMs>,

    /// Number of interruptions since the switch was last cycled.
    num_interruptions: u32
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmSwitch {
    /// Create a new arm switch on the given channel. Both arm switch
    /// failsafes start set.
    pub fn new(channel: RcChannel, mask: Arc<FailsafeMask>, clock: Arc<dyn Clock>) -> Self {
        mask.set(FailsafeReason::ArmSwitchDisarm);
        mask.set(FailsafeReason::ArmSwitch);

        Self {
            channel,
            mask,
            clock,
            interruption_start_ms: None,
            num_interruptions: 0
        }
    }

    /// Cyclic processing, to be called every strategy cycle.
    pub fn proc(&mut self, rc: &dyn RcChannelProvider) {
        let interrupted = self.mask.is_reason_set(FailsafeReason::Rc)
            || self.mask.is_reason_set(FailsafeReason::RcStale);

        if !self.mask.is_reason_set(FailsafeReason::ArmSwitchDisarm) {
            self.check_interruption(interrupted);
        }

        let value = rc::get_valid_value(rc, self.channel);
        let armed = matches!(value, Some(v) if v > ARM_SWITCH_THRESHOLD);

        // The switch only counts as seen disarmed on live data
        if value.is_some() && !armed && !interrupted {
            self.mask.clear(FailsafeReason::ArmSwitchDisarm);
            self.interruption_start_ms = None;
            self.num_interruptions = 0;
        }

        self.mask.set_value(FailsafeReason::ArmSwitch, !armed);
    }

    /// Number of radio control interruptions since the switch was last
    /// cycled.
    pub fn get_num_interruptions(&self) -> u32 {
        self.num_interruptions
    }

    fn check_interruption(&mut self, interrupted: bool) {
        let now = self.clock.now_ms();

        match (interrupted, self.interruption_start_ms) {
            (true, None) => {
                self.interruption_start_ms = Some(now);
                self.num_interruptions += 1;

                if self.num_interruptions > REPEAT_REARM_THRESHOLD {
                    warn!(
                        target: LOG_KEY,
                        "{} radio control failsafes since arming, arm switch must be cycled",
                        self.num_interruptions
                    );
                    self.require_rearm();
                }
            },
            (true, Some(start)) => {
                if now.saturating_sub(start) > REARM_TIMEOUT_MS {
                    warn!(
                        target: LOG_KEY,
                        "Radio control failsafe active for over {} ms, arm switch must be cycled",
                        REARM_TIMEOUT_MS
                    );
                    self.require_rearm();
                }
            },
            (false, Some(_)) => self.interruption_start_ms = None,
            (false, None) => ()
        }
    }

    fn require_rearm(&mut self) {
        self.mask.set(FailsafeReason::ArmSwitchDisarm);
        self.interruption_start_ms = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::failsafe::FailsafeCheck;
    use std::cell::Cell;
    use util::time::ManualClock;

    const ARM_CH: RcChannel = RcChannel(5);

    /// Provider with just an arm switch channel.
    struct Switch(Cell<Option<RcValue>>);

    impl RcChannelProvider for Switch {
        fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue> {
            match channel == ARM_CH {
                true => self.0.get(),
                false => None
            }
        }
    }

    struct Rig {
        mask: Arc<FailsafeMask>,
        clock: Arc<ManualClock>,
        switch: Switch,
        arm: ArmSwitch
    }

    impl Rig {
        fn new(initial: Option<RcValue>) -> Self {
            let mask = Arc::new(FailsafeMask::new());
            mask.clear(FailsafeReason::Boot);
            let clock = Arc::new(ManualClock::new(0));
            let arm = ArmSwitch::new(ARM_CH, mask.clone(), clock.clone());

            Self {
                mask,
                clock,
                switch: Switch(Cell::new(initial)),
                arm
            }
        }

        fn step(&mut self, value: Option<RcValue>, dt_ms: TimeMs) {
            self.switch.0.set(value);
            self.clock.advance_ms(dt_ms);
            self.arm.proc(&self.switch);
        }

        fn armed(&self) -> bool {
            !self.mask.is_failsafe_active()
        }
    }

    const ON: Option<RcValue> = Some(1811);
    const OFF: Option<RcValue> = Some(172);

    #[test]
    fn test_threshold() {
        assert_eq!(ARM_SWITCH_THRESHOLD, 1629);
    }

    #[test]
    fn test_switch_on_at_boot_does_not_arm() {
        let mut rig = Rig::new(ON);

        for _ in 0..10 {
            rig.step(ON, 10);
            assert!(!rig.armed());
            assert!(rig.mask.is_reason_set(FailsafeReason::ArmSwitchDisarm));
        }

        rig.step(OFF, 10);
        assert!(!rig.armed());
        rig.step(ON, 10);
        assert!(rig.armed());
    }

    #[test]
    fn test_invalid_value_is_disarmed() {
        let mut rig = Rig::new(OFF);
        rig.step(OFF, 10);
        rig.step(ON, 10);
        assert!(rig.armed());

        rig.step(Some(1900), 10);
        assert!(!rig.armed());
        assert!(rig.mask.is_reason_set(FailsafeReason::ArmSwitch));

        // Not a disarm observation, so re-arming doesn't need a cycle
        rig.step(ON, 10);
        assert!(rig.armed());
    }

    #[test]
    fn test_short_interruption_self_corrects() {
        let mut rig = Rig::new(OFF);
        rig.step(OFF, 10);
        rig.step(ON, 10);
        assert!(rig.armed());

        rig.mask.set(FailsafeReason::RcStale);
        rig.step(None, 10);
        rig.step(None, 100);
        rig.mask.clear(FailsafeReason::RcStale);
        rig.step(ON, 10);

        assert!(rig.armed());
        assert_eq!(rig.arm.get_num_interruptions(), 1);
    }

    #[test]
    fn test_long_interruption_requires_rearm() {
        let mut rig = Rig::new(OFF);
        rig.step(OFF, 10);
        rig.step(ON, 10);

        rig.mask.set(FailsafeReason::Rc);
        rig.step(ON, 10);
        rig.step(ON, 150);
        assert!(!rig.mask.is_reason_set(FailsafeReason::ArmSwitchDisarm));
        rig.step(ON, 100);
        assert!(rig.mask.is_reason_set(FailsafeReason::ArmSwitchDisarm));

        // Link restored, but the switch is still on
        rig.mask.clear(FailsafeReason::Rc);
        rig.step(ON, 10);
        assert!(!rig.armed());

        rig.step(OFF, 10);
        rig.step(ON, 10);
        assert!(rig.armed());
        assert_eq!(rig.arm.get_num_interruptions(), 0);
    }

    #[test]
    fn test_repeated_interruptions_require_rearm() {
        let mut rig = Rig::new(OFF);
        rig.step(OFF, 10);
        rig.step(ON, 10);

        for i in 1..=REPEAT_REARM_THRESHOLD {
            rig.mask.set(FailsafeReason::RcStale);
            rig.step(None, 10);
            rig.mask.clear(FailsafeReason::RcStale);
            rig.step(ON, 10);
            assert!(rig.armed(), "disarmed after {} interruptions", i);
        }

        rig.mask.set(FailsafeReason::RcStale);
        rig.step(None, 10);
        rig.mask.clear(FailsafeReason::RcStale);
        rig.step(ON, 10);
        assert!(!rig.armed());
        assert!(rig.mask.is_reason_set(FailsafeReason::ArmSwitchDisarm));
    }
}
