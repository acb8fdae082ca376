//! # Drive Executable Parameters
//!
//! This module provides parameters for the drive executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

use crate::rc::RcChannel;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DriveExecParams {

    /// Target period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// The drive strategy, radio control monitoring and arm switch run once
    /// every this many control cycles.
    pub strategy_cycle_divisor: u32,

    /// Minimum level of log records, one of `info`, `debug` or `trace`.
    pub log_level: String,

    /// Channel of the arm switch.
    pub arm_channel: RcChannel,

    /// Number of consecutive cycle overruns after which the executable
    /// stops.
    pub max_consec_overruns: u64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("The cycle period must be positive and finite, found {0} s")]
    InvalidCyclePeriod(f64),

    #[error("The strategy cycle divisor must be at least 1")]
    InvalidStrategyDivisor,

    #[error("The arm switch channel is invalid")]
    InvalidArmChannel
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveExecParams {
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if !self.cycle_period_s.is_finite() || self.cycle_period_s <= 0.0 {
            return Err(ParamsError::InvalidCyclePeriod(self.cycle_period_s))
        }
        if self.strategy_cycle_divisor == 0 {
            return Err(ParamsError::InvalidStrategyDivisor)
        }
        if self.arm_channel.index().is_none() {
            return Err(ParamsError::InvalidArmChannel)
        }

        Ok(())
    }

    /// `true` if the strategy should run on the given cycle.
    pub fn is_strategy_cycle(&self, cycle: u64) -> bool {
        cycle % self.strategy_cycle_divisor as u64 == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PARAMS: &str = r#"
        cycle_period_s = 0.002
        strategy_cycle_divisor = 5
        log_level = "debug"
        arm_channel = 5
        max_consec_overruns = 500
    "#;

    #[test]
    fn test_load() {
        let mut p: DriveExecParams = util::params::from_str(PARAMS).unwrap();
        assert_eq!(p.are_valid(), Ok(()));
        assert_eq!(p.arm_channel, RcChannel(5));

        assert!(p.is_strategy_cycle(0));
        assert!(!p.is_strategy_cycle(4));
        assert!(p.is_strategy_cycle(10));

        p.strategy_cycle_divisor = 0;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidStrategyDivisor));

        p.strategy_cycle_divisor = 1;
        p.cycle_period_s = 0.0;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidCyclePeriod(0.0)));

        p.cycle_period_s = 0.01;
        p.arm_channel = RcChannel::INVALID;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidArmChannel));
    }
}
