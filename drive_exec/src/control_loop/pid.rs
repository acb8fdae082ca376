//! PID control loop with fixed point gains and integral anti-windup.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{NumCast, PrimInt};
use serde::Deserialize;

use super::{ControlLoop, ControlLoopError, LoopCore, LoopValue};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a PID loop, each given as a numerator and denominator.
///
/// Terms are computed as `value * num / den` using truncating integer
/// division, saturating rather than overflowing.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PidGains {
    pub p_num: u32,
    pub p_den: u32,
    pub i_num: u32,
    pub i_den: u32,
    pub d_num: u32,
    pub d_den: u32
}

/// A PID control loop.
///
/// The integral of the error is only accumulated while the output is not
/// saturated, or when the new error would drive the output back out of
/// saturation.
#[derive(Debug, Clone)]
pub struct PidLoop<SP, OUT> {
    core: LoopCore<SP, OUT>,

    gains: PidGains,

    error_prev: SP,
    error_integrated: SP
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    /// Create gains from `(num, den)` pairs.
    pub fn new(p: (u32, u32), i: (u32, u32), d: (u32, u32)) -> Self {
        Self {
            p_num: p.0, p_den: p.1,
            i_num: i.0, i_den: i.1,
            d_num: d.0, d_den: d.1
        }
    }

    /// Check that no gain has a zero denominator.
    pub fn are_valid(&self) -> Result<(), ControlLoopError> {
        if self.p_den == 0 {
            return Err(ControlLoopError::ZeroGainDenominator("P"))
        }
        if self.i_den == 0 {
            return Err(ControlLoopError::ZeroGainDenominator("I"))
        }
        if self.d_den == 0 {
            return Err(ControlLoopError::ZeroGainDenominator("D"))
        }

        Ok(())
    }
}

impl<SP, OUT> PidLoop<SP, OUT>
where
    SP: LoopValue,
    OUT: LoopValue
{
    /// Create a new PID loop.
    pub fn new(
        sp_range: (SP, SP),
        output_range: (OUT, OUT),
        gains: PidGains,
        log_key: &str
    ) -> Result<Self, ControlLoopError> {
        gains.are_valid()?;

        Ok(Self {
            core: LoopCore::new(sp_range, output_range, log_key)?,
            gains,
            error_prev: SP::zero(),
            error_integrated: SP::zero()
        })
    }

    /// Get the accumulated integral of the error.
    pub fn get_integral(&self) -> SP {
        self.error_integrated
    }

    /// Get the error used by the previous iteration.
    pub fn get_prev_error(&self) -> SP {
        self.error_prev
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// `value * num / den`, multiplied in the setpoint domain and divided in
    /// the output domain.
    fn term(value: SP, num: u32, den: u32) -> OUT {
        let num: SP = saturating_cast(num);
        let den: OUT = saturating_cast(den);
        let scaled = value.checked_mul(&num).unwrap_or_else(|| match value < SP::zero() {
            true => SP::min_value(),
            false => SP::max_value()
        });
        saturating_cast::<SP, OUT>(scaled) / den
    }
}

impl<SP, OUT> ControlLoop<SP, OUT> for PidLoop<SP, OUT>
where
    SP: LoopValue,
    OUT: LoopValue
{
    fn core(&self) -> &LoopCore<SP, OUT> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoopCore<SP, OUT> {
        &mut self.core
    }

    fn update_output(&mut self) {
        let error = self.core.get_error();
        let new_error_integrated = self.error_integrated.saturating_add(error);

        let p_term = Self::term(error, self.gains.p_num, self.gains.p_den);
        let i_term = Self::term(new_error_integrated, self.gains.i_num, self.gains.i_den);
        let d_term = Self::term(
            error.saturating_sub(self.error_prev), self.gains.d_num, self.gains.d_den
        );

        let new_output = p_term.saturating_add(i_term).saturating_add(d_term);

        // Compare the unclamped output against the limits
        let in_range = self.core.set_output(new_output);
        let unwinding =
            (new_output >= self.core.get_output_max() && error < SP::zero())
            ||
            (new_output <= self.core.get_output_min() && error > SP::zero());

        if in_range || unwinding {
            self.error_integrated = new_error_integrated;
        }

        self.error_prev = error;
    }

    fn reset(&mut self, new_setpoint: SP) {
        self.core.reset(new_setpoint);
        self.error_integrated = SP::zero();
        self.error_prev = self.core.get_error();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert an integer to another type, saturating at the target's bounds.
fn saturating_cast<T: PrimInt, U: PrimInt>(value: T) -> U {
    match <U as NumCast>::from(value) {
        Some(v) => v,
        None if value < T::zero() => U::min_value(),
        None => U::max_value()
    }
}
