//! # Radio control module
//!
//! Channel values are provided by an external receiver decoder through the
//! [`RcChannelProvider`] trait. A channel value is only usable if it lies
//! within `[RC_CH_MIN_VALUE, RC_CH_MAX_VALUE]`, anything else (including no
//! value at all) is treated as invalid.
//!
//! [`RcMonitor`] turns the receiver's frame arrivals into the `Rc` and
//! `RcStale` failsafe reasons.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod script;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

// Internal
pub use script::*;
use crate::failsafe::{FailsafeMask, FailsafeReason};
use util::time::{Clock, TimeMs};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lowest valid channel value.
pub const RC_CH_MIN_VALUE: RcValue = 172;

/// Highest valid channel value.
pub const RC_CH_MAX_VALUE: RcValue = 1811;

/// Channel value with the stick centred.
pub const RC_CH_CENTER_VALUE: RcValue = (RC_CH_MAX_VALUE + RC_CH_MIN_VALUE) / 2;

/// Nominal period between receiver frames.
///
/// Units: milliseconds
pub const RC_UPDATE_PERIOD_MS: TimeMs = 14;

/// Time without a frame after which the data is considered stale.
///
/// Units: milliseconds
pub const RC_STALE_TIMEOUT_MS: TimeMs = 4 * RC_UPDATE_PERIOD_MS;

/// Log key for radio control records.
pub const LOG_KEY: &str = "rc";

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of radio control channel values.
pub trait RcChannelProvider {
    /// Get the current value of a channel, or `None` if there is no data for
    /// it.
    fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Raw radio control channel value.
pub type RcValue = u16;

/// A radio control channel number. Channels are numbered from 1, channel 0
/// is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct RcChannel(pub u8);

/// Watches receiver frame arrivals and sets the radio control failsafes.
pub struct RcMonitor {
    mask: Arc<FailsafeMask>,
    clock: Arc<dyn Clock>,
    last_frame_ms: TimeMs
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RcChannel {
    pub const INVALID: RcChannel = RcChannel(0);

    /// Zero based index of the channel, `None` for the invalid channel.
    pub fn index(self) -> Option<usize> {
        match self.0 {
            0 => None,
            n => Some(n as usize - 1)
        }
    }
}

impl RcMonitor {
    /// Create a new monitor. The data is stale until the first frame arrives.
    pub fn new(mask: Arc<FailsafeMask>, clock: Arc<dyn Clock>) -> Self {
        mask.set(FailsafeReason::RcStale);
        let last_frame_ms = clock.now_ms();

        Self {
            mask,
            clock,
            last_frame_ms
        }
    }

    /// Cyclic processing.
    ///
    /// `new_frame` is true if a frame has been received since the last call,
    /// in which case `receiver_failsafe` is the failsafe flag carried by that
    /// frame.
    pub fn proc(&mut self, new_frame: bool, receiver_failsafe: bool) {
        let now = self.clock.now_ms();

        if new_frame {
            self.mask.set_value(FailsafeReason::Rc, receiver_failsafe);
            self.last_frame_ms = now;
            self.mask.clear(FailsafeReason::RcStale);
        }
        else if now.saturating_sub(self.last_frame_ms) > RC_STALE_TIMEOUT_MS {
            if !self.mask.is_reason_set(FailsafeReason::RcStale) {
                warn!(
                    target: LOG_KEY,
                    "No frame received for {} ms",
                    now.saturating_sub(self.last_frame_ms)
                );
            }
            self.mask.set(FailsafeReason::RcStale);
        }
    }

    /// `true` if the data is stale.
    pub fn is_stale(&self) -> bool {
        self.mask.is_reason_set(FailsafeReason::RcStale)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// `true` if the value is within the valid channel range.
pub fn is_valid_value(value: RcValue) -> bool {
    value >= RC_CH_MIN_VALUE && value <= RC_CH_MAX_VALUE
}

/// Read a channel, returning its value only if it is valid.
pub fn get_valid_value(rc: &dyn RcChannelProvider, channel: RcChannel) -> Option<RcValue> {
    if channel.index().is_none() {
        return None
    }

    rc.get_channel_value(channel).filter(|v| is_valid_value(*v))
}

#[cfg(test)]
mod test {
    use super::*;
    use util::time::ManualClock;

    /// Provider returning fixed values for channels 1 onwards.
    struct Fixed(Vec<Option<RcValue>>);

    impl RcChannelProvider for Fixed {
        fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue> {
            channel.index().and_then(|i| self.0.get(i).copied().flatten())
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(RC_CH_CENTER_VALUE, 991);
        assert_eq!(RC_STALE_TIMEOUT_MS, 56);
    }

    #[test]
    fn test_valid_values() {
        let rc = Fixed(vec![Some(172), Some(1811), Some(171), Some(1812), None, Some(0)]);

        assert_eq!(get_valid_value(&rc, RcChannel(1)), Some(172));
        assert_eq!(get_valid_value(&rc, RcChannel(2)), Some(1811));
        assert_eq!(get_valid_value(&rc, RcChannel(3)), None);
        assert_eq!(get_valid_value(&rc, RcChannel(4)), None);
        assert_eq!(get_valid_value(&rc, RcChannel(5)), None);
        assert_eq!(get_valid_value(&rc, RcChannel(6)), None);
        assert_eq!(get_valid_value(&rc, RcChannel(7)), None);
        assert_eq!(get_valid_value(&rc, RcChannel::INVALID), None);
    }

    #[test]
    fn test_monitor() {
        let mask = Arc::new(FailsafeMask::new());
        let clock = Arc::new(ManualClock::new(0));
        let mut monitor = RcMonitor::new(mask.clone(), clock.clone());
        assert!(monitor.is_stale());

        clock.set_ms(10);
        monitor.proc(true, false);
        assert!(!monitor.is_stale());
        assert!(!mask.is_reason_set(FailsafeReason::Rc));

        // Within the timeout nothing changes
        clock.set_ms(66);
        monitor.proc(false, false);
        assert!(!monitor.is_stale());

        clock.set_ms(67);
        monitor.proc(false, false);
        assert!(monitor.is_stale());

        // A frame carrying the receiver failsafe flag clears staleness but
        // raises the receiver failsafe
        clock.set_ms(80);
        monitor.proc(true, true);
        assert!(!monitor.is_stale());
        assert!(mask.is_reason_set(FailsafeReason::Rc));

        monitor.proc(true, false);
        assert!(!mask.is_reason_set(FailsafeReason::Rc));
        assert_eq!(mask.active_reasons(), vec![FailsafeReason::Boot]);
    }
}
