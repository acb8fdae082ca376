//! # Control loop module
//!
//! A control loop drives an output towards the value that makes its feedback
//! equal its setpoint. Both the setpoint and the output are bounded and are
//! always kept within their ranges by clamping.
//!
//! Loops are generic over the setpoint domain `SP` (also the domain of the
//! feedback and the error) and the output domain `OUT`. The shared state and
//! bookkeeping lives in [`LoopCore`], while the algorithm used to compute a
//! new output is provided by implementors of the [`ControlLoop`] trait.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pid;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use num_traits::{PrimInt, Signed};
use std::fmt::{Debug, Display};
use thiserror::Error;

// Internal
pub use pid::*;
use util::maths;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Values which a control loop can operate on.
pub trait LoopValue: PrimInt + Signed + Debug + Display + Send + 'static {}

impl<T> LoopValue for T where T: PrimInt + Signed + Debug + Display + Send + 'static {}

/// A saturating control loop.
///
/// Implementors provide access to their [`LoopCore`] and the
/// `update_output` step, all other operations have default implementations.
pub trait ControlLoop<SP: LoopValue, OUT: LoopValue>: Send {

    /// Shared loop state.
    fn core(&self) -> &LoopCore<SP, OUT>;

    /// Mutable access to the shared loop state.
    fn core_mut(&mut self) -> &mut LoopCore<SP, OUT>;

    /// Compute a new output from the current error, storing it with
    /// `LoopCore::set_output`.
    fn update_output(&mut self);

    /// Re-centre the loop state and apply a new setpoint.
    fn reset(&mut self, new_setpoint: SP) {
        self.core_mut().reset(new_setpoint);
    }

    /// Reset the loop, keeping the current setpoint.
    fn reset_current(&mut self) {
        let sp = self.core().get_setpoint();
        self.reset(sp);
    }

    /// Set a new setpoint, returning `false` if it had to be clamped.
    fn set_setpoint(&mut self, new_setpoint: SP) -> bool {
        self.core_mut().set_setpoint(new_setpoint)
    }

    fn get_setpoint(&self) -> SP {
        self.core().get_setpoint()
    }

    fn get_output(&self) -> OUT {
        self.core().get_output()
    }

    fn get_error(&self) -> SP {
        self.core().get_error()
    }

    /// Run one iteration of the loop against the given feedback and return
    /// the new output.
    fn proc(&mut self, feedback: SP) -> OUT {
        {
            let core = self.core_mut();
            core.error = core.setpoint.saturating_sub(feedback);
        }

        self.update_output();

        let core = self.core();
        trace!(
            target: core.log_key(),
            "|{:+05}|{:+05}|{:+05}|",
            core.setpoint, core.output, core.error
        );

        core.output
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State common to all control loops.
#[derive(Debug, Clone)]
pub struct LoopCore<SP, OUT> {
    sp_min: SP,
    sp_max: SP,
    output_min: OUT,
    output_max: OUT,

    setpoint: SP,
    output: OUT,
    error: SP,

    log_key: String
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors in the construction of a control loop.
#[derive(Debug, Error, PartialEq)]
pub enum ControlLoopError {
    #[error("Setpoint range is empty, min ({0}) is greater than max ({1})")]
    InvalidSetpointRange(String, String),

    #[error("Output range is empty, min ({0}) is greater than max ({1})")]
    InvalidOutputRange(String, String),

    #[error("The {0} gain has a zero denominator")]
    ZeroGainDenominator(&'static str)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<SP: LoopValue, OUT: LoopValue> LoopCore<SP, OUT> {

    /// Create a new loop core with the given setpoint and output ranges.
    ///
    /// The setpoint and output start at the midpoint of their ranges.
    pub fn new(
        sp_range: (SP, SP),
        output_range: (OUT, OUT),
        log_key: &str
    ) -> Result<Self, ControlLoopError> {
        if sp_range.0 > sp_range.1 {
            return Err(ControlLoopError::InvalidSetpointRange(
                sp_range.0.to_string(), sp_range.1.to_string()
            ))
        }
        if output_range.0 > output_range.1 {
            return Err(ControlLoopError::InvalidOutputRange(
                output_range.0.to_string(), output_range.1.to_string()
            ))
        }

        let mut core = Self {
            sp_min: sp_range.0,
            sp_max: sp_range.1,
            output_min: output_range.0,
            output_max: output_range.1,
            setpoint: SP::zero(),
            output: OUT::zero(),
            error: SP::zero(),
            log_key: log_key.to_string()
        };
        core.set_initial_state();

        Ok(core)
    }

    fn set_initial_state(&mut self) {
        self.setpoint = maths::midpoint(self.sp_min, self.sp_max);
        self.output = maths::midpoint(self.output_min, self.output_max);
        self.error = SP::zero();
    }

    /// Re-centre the setpoint and output and zero the error, then apply the
    /// new setpoint.
    pub fn reset(&mut self, new_setpoint: SP) {
        self.set_initial_state();
        self.set_setpoint(new_setpoint);
    }

    /// Set the setpoint, clamping it into range. Returns `false` if the value
    /// was clamped.
    pub fn set_setpoint(&mut self, new_setpoint: SP) -> bool {
        let (sp, in_range) = maths::clamp_checked(
            &new_setpoint, &self.sp_min, &self.sp_max
        );
        self.setpoint = sp;
        in_range
    }

    /// Set the output, clamping it into range. Returns `false` if the value
    /// was clamped.
    pub fn set_output(&mut self, new_output: OUT) -> bool {
        let (output, in_range) = maths::clamp_checked(
            &new_output, &self.output_min, &self.output_max
        );
        self.output = output;
        in_range
    }

    pub fn get_setpoint(&self) -> SP {
        self.setpoint
    }

    pub fn get_output(&self) -> OUT {
        self.output
    }

    pub fn get_error(&self) -> SP {
        self.error
    }

    pub fn get_sp_min(&self) -> SP {
        self.sp_min
    }

    pub fn get_sp_max(&self) -> SP {
        self.sp_max
    }

    pub fn get_output_min(&self) -> OUT {
        self.output_min
    }

    pub fn get_output_max(&self) -> OUT {
        self.output_max
    }

    pub fn log_key(&self) -> &str {
        &self.log_key
    }
}
