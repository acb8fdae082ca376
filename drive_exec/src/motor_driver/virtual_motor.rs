//! Simulated motor hardware

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering},
    Arc
};

use super::{FaultStatus, MotorCommand, MotorHw, MotorHwError};
use crate::Rpm;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A motor which only logs what it is told to do.
pub struct VirtualMotor {
    log_key: String,
    state: Arc<VirtualMotorState>
}

/// What a virtual motor has been told to do, shared so it can be observed
/// from outside the driver.
#[derive(Debug, Default)]
pub struct VirtualMotorState {
    active: AtomicBool,
    commanded_rpm: AtomicI32,
    num_commands: AtomicU32,
    num_disables: AtomicU32
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VirtualMotor {
    pub fn new(log_key: &str) -> Self {
        info!(target: log_key, "Virtual motor initialised");

        Self {
            log_key: log_key.to_string(),
            state: Arc::new(VirtualMotorState::default())
        }
    }

    /// Handle on the motor's state.
    pub fn state(&self) -> Arc<VirtualMotorState> {
        self.state.clone()
    }
}

impl MotorHw for VirtualMotor {
    fn disable_motor(&mut self) -> Result<(), MotorHwError> {
        if self.state.active.swap(false, Ordering::SeqCst) {
            info!(target: self.log_key.as_str(), "Deactivated");
        }
        self.state.num_disables.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn command_motor(&mut self, command: &MotorCommand) -> Result<(), MotorHwError> {
        if !self.state.active.swap(true, Ordering::SeqCst) {
            info!(target: self.log_key.as_str(), "Activated");
        }

        if command.commanded_rpm == command.neutral_commanded_rpm {
            debug!(target: self.log_key.as_str(), "Braking");
        }
        else {
            debug!(
                target: self.log_key.as_str(),
                "set_rpm: {}, commanded_rpm: {}",
                command.set_rpm, command.commanded_rpm
            );
        }

        self.state.commanded_rpm.store(command.commanded_rpm, Ordering::SeqCst);
        self.state.num_commands.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn get_fault_status(&self) -> FaultStatus {
        FaultStatus::None
    }
}

impl VirtualMotorState {
    /// `true` if the motor is energised.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Last command received.
    pub fn commanded_rpm(&self) -> Rpm {
        self.commanded_rpm.load(Ordering::SeqCst)
    }

    pub fn num_commands(&self) -> u32 {
        self.num_commands.load(Ordering::SeqCst)
    }

    pub fn num_disables(&self) -> u32 {
        self.num_disables.load(Ordering::SeqCst)
    }
}
