//! # Failsafe module
//!
//! The failsafe mask holds one bit for each reason the robot must not move.
//! Motors may only be energised while the mask is exactly zero. Any context
//! may set or clear reasons, every access goes through a critical section.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod arm_switch;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use critical_section::Mutex;
use log::{info, warn};
use serde::Serialize;
use std::cell::Cell;

// Internal
pub use arm_switch::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log key for failsafe records.
pub const LOG_KEY: &str = "failsafe";

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A query of whether a failsafe is currently active.
///
/// Implementations must not have side effects visible to the caller.
pub trait FailsafeCheck: Send + Sync {
    fn is_failsafe_active(&self) -> bool;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Raw failsafe mask, bit `n` is set for the reason with discriminant `n`.
pub type FailsafeBits = u32;

/// The failsafe mask.
pub struct FailsafeMask {
    mask: Mutex<Cell<FailsafeBits>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons for the failsafe to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailsafeReason {
    /// Set at start up, cleared once initialisation is complete.
    Boot = 0,

    /// The arm switch has not been seen in the disarmed position since it was
    /// last required to be. Prevents arming if the switch is already on at
    /// start up.
    ArmSwitchDisarm = 1,

    /// The arm switch is in the disarmed position.
    ArmSwitch = 2,

    /// The radio control receiver is in its own failsafe mode.
    Rc = 3,

    /// Radio control data is stale.
    RcStale = 4
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FailsafeReason {
    pub const ALL: [FailsafeReason; 5] = [
        FailsafeReason::Boot,
        FailsafeReason::ArmSwitchDisarm,
        FailsafeReason::ArmSwitch,
        FailsafeReason::Rc,
        FailsafeReason::RcStale
    ];

    /// The bit for this reason in the mask.
    pub fn bit(self) -> FailsafeBits {
        1 << (self as u32)
    }
}

impl FailsafeMask {
    /// Create a new mask with only [`FailsafeReason::Boot`] set.
    pub fn new() -> Self {
        Self {
            mask: Mutex::new(Cell::new(FailsafeReason::Boot.bit()))
        }
    }

    /// Set a failsafe reason.
    pub fn set(&self, reason: FailsafeReason) {
        let (old, new) = self.update(|m| m | reason.bit());

        if old != new {
            info!(target: LOG_KEY, "{:?} set, new failsafe mask: {:#04x}", reason, new);
            if old == 0 {
                warn!(target: LOG_KEY, "FAILSAFE SET!");
            }
        }
    }

    /// Clear a failsafe reason.
    pub fn clear(&self, reason: FailsafeReason) {
        let (old, new) = self.update(|m| m & !reason.bit());

        if old != new {
            info!(target: LOG_KEY, "{:?} cleared, new failsafe mask: {:#04x}", reason, new);
            if new == 0 {
                info!(target: LOG_KEY, "ARMED!");
            }
        }
    }

    /// Set the reason if `value` is true, otherwise clear it.
    pub fn set_value(&self, reason: FailsafeReason, value: bool) {
        match value {
            true => self.set(reason),
            false => self.clear(reason)
        }
    }

    pub fn get_mask(&self) -> FailsafeBits {
        critical_section::with(|cs| self.mask.borrow(cs).get())
    }

    /// `true` if any reason is set.
    pub fn is_set(&self) -> bool {
        self.get_mask() != 0
    }

    /// `true` if the given reason is set.
    pub fn is_reason_set(&self, reason: FailsafeReason) -> bool {
        self.get_mask() & reason.bit() != 0
    }

    /// All reasons currently set.
    pub fn active_reasons(&self) -> Vec<FailsafeReason> {
        let mask = self.get_mask();
        FailsafeReason::ALL
            .iter()
            .copied()
            .filter(|r| mask & r.bit() != 0)
            .collect()
    }

    /// Apply `f` to the mask, returning the old and new values.
    fn update<F>(&self, f: F) -> (FailsafeBits, FailsafeBits)
    where
        F: FnOnce(FailsafeBits) -> FailsafeBits
    {
        critical_section::with(|cs| {
            let cell = self.mask.borrow(cs);
            let old = cell.get();
            let new = f(old);
            cell.set(new);
            (old, new)
        })
    }
}

impl Default for FailsafeMask {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FailsafeMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailsafeMask")
            .field("mask", &format_args!("{:#04x}", self.get_mask()))
            .finish()
    }
}

impl FailsafeCheck for FailsafeMask {
    fn is_failsafe_active(&self) -> bool {
        self.is_set()
    }
}
