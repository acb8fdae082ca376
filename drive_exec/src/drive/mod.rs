//! # Drive module
//!
//! Ties a pair of motor stacks (a motor driver and, optionally, the encoder
//! measuring it) to a drive strategy.
//!
//! The drive is processed in two parts which run at different rates:
//!
//! - [`Drive::strategy_proc`] reads radio control input and updates the set
//!   rpm of each motor.
//! - [`Drive::control_proc`] updates the encoders and runs each motor driver,
//!   producing a [`StatusReport`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// Internal
pub use params::Params;
use crate::control_loop::{ControlLoopError, PidLoop};
use crate::drive_strategy::{Arcade, DriveStrategy, DriveStrategyKind, Tank};
use crate::encoder::Encoder;
use crate::failsafe::FailsafeMask;
use crate::motor_driver::{
    DisableReason, MotorDriver, MotorDriverConfig, MotorDriverError, MotorStatus, VirtualMotor
};
use crate::rc::RcChannelProvider;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log key for drive records.
pub const LOG_KEY: &str = "drive";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A motor driver and the encoder measuring its motor.
pub struct MotorStack {
    pub driver: MotorDriver,
    pub encoder: Option<Arc<Encoder>>
}

/// A two sided drivetrain.
pub struct Drive {
    left: MotorStack,
    right: MotorStack,
    strategy: Box<dyn DriveStrategy>
}

/// Status of the drive after a control cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusReport {
    pub left: MotorStatus,
    pub right: MotorStatus,

    /// `true` if the left hardware reported an error this cycle.
    pub left_hw_error: bool,

    /// `true` if the right hardware reported an error this cycle.
    pub right_hw_error: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Could not create a motor driver: {0}")]
    MotorDriverError(#[from] MotorDriverError),

    #[error("Could not create a speed control loop: {0}")]
    ControlLoopError(#[from] ControlLoopError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotorStack {
    /// A motor without an encoder.
    pub fn new(driver: MotorDriver) -> Self {
        Self {
            driver,
            encoder: None
        }
    }

    /// A motor measured by the given encoder. The encoder is not attached to
    /// the driver, use [`MotorDriver::with_encoder`] for closed loop control.
    pub fn with_encoder(driver: MotorDriver, encoder: Arc<Encoder>) -> Self {
        Self {
            driver,
            encoder: Some(encoder)
        }
    }

    /// One control cycle, returning `false` if the hardware reported an
    /// error.
    fn proc(&mut self) -> bool {
        if let Some(ref e) = self.encoder {
            e.proc();
        }

        self.check_fault();

        match self.driver.proc() {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: self.driver.log_key(),
                    "Hardware error during processing: {}", e
                );
                false
            }
        }
    }

    /// Disable the motor while the hardware reports a fault. The motor is
    /// de-energised by the driver processing that follows.
    fn check_fault(&mut self) {
        let faulty = self.driver.get_fault_status().is_faulty();
        let fault_set = self.driver.get_disable_mask() & DisableReason::Fault.bit() != 0;

        if faulty && !fault_set {
            warn!(
                target: self.driver.log_key(),
                "Motor fault: {:?}", self.driver.get_fault_status()
            );
            self.driver.set_disable_reason(DisableReason::Fault);
        }
        else if !faulty && fault_set {
            info!(target: self.driver.log_key(), "Motor fault cleared");
            self.driver.enable(DisableReason::Fault);
        }
    }
}

impl Drive {
    pub fn new(left: MotorStack, right: MotorStack, strategy: Box<dyn DriveStrategy>) -> Self {
        info!(target: LOG_KEY, "Drive initialised with {} strategy", strategy.name());

        Self {
            left,
            right,
            strategy
        }
    }

    /// Build a drive on virtual motors from its parameters.
    ///
    /// Both motors and the strategy are gated by the failsafe mask.
    pub fn from_params(params: &Params, mask: Arc<FailsafeMask>) -> Result<Self, DriveError> {
        let left = virtual_driver(&params.left_motor, params, "left", &mask)?;
        let right = virtual_driver(&params.right_motor, params, "right", &mask)?;

        let strategy: Box<dyn DriveStrategy> = match params.strategy {
            DriveStrategyKind::Arcade => Box::new(
                Arcade::new(params.throttle_channel, params.steering_channel)
                    .with_deadzone(params.deadzone)
                    .with_failsafe(mask)
            ),
            DriveStrategyKind::Tank => Box::new(
                Tank::new(params.left_channel, params.right_channel)
                    .with_deadzone(params.deadzone)
                    .with_failsafe(mask)
            )
        };

        Ok(Self::new(MotorStack::new(left), MotorStack::new(right), strategy))
    }

    /// Update the motor set rpms from radio control input.
    pub fn strategy_proc(&mut self, rc: &dyn RcChannelProvider) {
        self.strategy.proc(&mut self.left.driver, &mut self.right.driver, rc);
    }

    /// Process the encoders and motor drivers.
    pub fn control_proc(&mut self) -> StatusReport {
        let left_ok = self.left.proc();
        let right_ok = self.right.proc();

        StatusReport {
            left: self.left.driver.status(),
            right: self.right.driver.status(),
            left_hw_error: !left_ok,
            right_hw_error: !right_ok
        }
    }

    /// Emergency stop both motors.
    pub fn estop(&mut self) {
        warn!(target: LOG_KEY, "Emergency stop");
        self.left.driver.disable(DisableReason::EStop);
        self.right.driver.disable(DisableReason::EStop);
    }

    /// Release an emergency stop.
    pub fn release_estop(&mut self) {
        info!(target: LOG_KEY, "Emergency stop released");
        self.left.driver.enable(DisableReason::EStop);
        self.right.driver.enable(DisableReason::EStop);
    }

    pub fn set_limp_mode(&mut self, limp: bool) {
        self.left.driver.set_limp_mode(limp);
        self.right.driver.set_limp_mode(limp);
    }

    pub fn left(&self) -> &MotorStack {
        &self.left
    }

    pub fn right(&self) -> &MotorStack {
        &self.right
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn virtual_driver(
    config: &MotorDriverConfig,
    params: &Params,
    side: &str,
    mask: &Arc<FailsafeMask>
) -> Result<MotorDriver, DriveError> {
    let log_key = format!("motor_driver_{}", side);
    let hw = VirtualMotor::new(&format!("virtual_motor_{}", side));

    let mut driver = MotorDriver::new(*config, hw, &log_key)?
        .with_failsafe(mask.clone());

    if let Some(gains) = params.pid_gains {
        let pid = PidLoop::new(
            (config.min_rpm, config.max_rpm),
            (config.min_commanded_rpm, config.max_commanded_rpm),
            gains,
            &format!("pid_{}", side)
        )?;
        driver = driver.with_control_loop(Box::new(pid));
    }

    driver.set_limp_mode(params.force_limp);

    Ok(driver)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::control_loop::PidGains;
    use crate::encoder::{EncoderConfig, SimPin};
    use crate::failsafe::FailsafeReason;
    use crate::motor_driver::{FaultStatus, MotorCommand, MotorHw, MotorHwError};
    use crate::rc::{RcChannel, RcValue};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use util::time::ManualClock;

    const PARAMS: &str = r#"
        strategy = "Arcade"
        throttle_channel = 2
        steering_channel = 1
        force_limp = true

        [left_motor]
        min_rpm = -1000
        max_rpm = 1000
        min_commanded_rpm = -100
        max_commanded_rpm = 100

        [right_motor]
        invert_direction = true
        min_rpm = -1000
        max_rpm = 1000
        min_commanded_rpm = -100
        max_commanded_rpm = 100

        [pid_gains]
        p_num = 50
        p_den = 100
        i_num = 25
        i_den = 100
        d_num = 12
        d_den = 100
    "#;

    /// Four channel input.
    struct Sticks([Option<RcValue>; 4]);

    impl RcChannelProvider for Sticks {
        fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue> {
            channel.index().and_then(|i| self.0.get(i).copied().flatten())
        }
    }

    /// Hardware whose fault output can be toggled, counting disables.
    struct FaultyHw(Arc<AtomicBool>, Arc<AtomicU32>);

    impl MotorHw for FaultyHw {
        fn disable_motor(&mut self) -> Result<(), MotorHwError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn command_motor(&mut self, _: &MotorCommand) -> Result<(), MotorHwError> {
            Ok(())
        }

        fn get_fault_status(&self) -> FaultStatus {
            match self.0.load(Ordering::SeqCst) {
                true => FaultStatus::OverCurrent,
                false => FaultStatus::None
            }
        }
    }

    fn drive() -> (Drive, Arc<FailsafeMask>) {
        let params: Params = util::params::from_str(PARAMS).unwrap();
        let mask = Arc::new(FailsafeMask::new());
        (Drive::from_params(&params, mask.clone()).unwrap(), mask)
    }

    #[test]
    fn test_from_params() {
        let (d, _) = drive();

        assert_eq!(d.strategy_name(), "arcade");
        assert!(d.left().driver.is_limp());
        assert!(d.left().encoder.is_none());
        assert_eq!(d.left().driver.log_key(), "motor_driver_left");
    }

    #[test]
    fn test_boot_failsafe_then_drive() {
        let (mut d, mask) = drive();
        let sticks = Sticks([Some(991), Some(1811), Some(991), Some(991)]);

        d.strategy_proc(&sticks);
        let report = d.control_proc();
        assert!(report.left.disabled);
        assert!(report.right.disabled);
        assert_eq!(report.left.commanded_rpm, 0);

        mask.clear(FailsafeReason::Boot);
        d.strategy_proc(&sticks);
        let report = d.control_proc();
        assert!(!report.left.disabled);
        assert_eq!(report.left.set_rpm, 1000);
        assert_eq!(report.left.commanded_rpm, 100);

        // Right side is mounted the other way round
        assert_eq!(report.right.set_rpm, -1000);
        assert_eq!(report.right.commanded_rpm, -100);
        assert!(!report.left_hw_error);
    }

    #[test]
    fn test_report_serialises() {
        let (mut d, _) = drive();
        let json = serde_json::to_string(&d.control_proc()).unwrap();

        assert!(json.contains("\"commanded_rpm\":0"));
        assert!(json.contains("\"fault_status\":\"None\""));
        assert!(json.contains("\"left_hw_error\":false"));
    }

    #[test]
    fn test_estop() {
        let (mut d, mask) = drive();
        mask.clear(FailsafeReason::Boot);
        let sticks = Sticks([Some(991), Some(1811), Some(991), Some(991)]);

        d.estop();
        d.strategy_proc(&sticks);
        let report = d.control_proc();
        assert!(report.left.disabled);
        assert_eq!(report.left.disable_mask, DisableReason::EStop.bit());

        d.release_estop();
        let report = d.control_proc();
        assert!(!report.left.disabled);
        assert_eq!(report.left.commanded_rpm, 100);
    }

    #[test]
    fn test_closed_loop_with_encoder() {
        let clock = Arc::new(ManualClock::new(0));
        let (a, b) = (SimPin::new(false), SimPin::new(false));
        let encoder = Arc::new(Encoder::new(
            a.clone(),
            b.clone(),
            EncoderConfig { counts_per_revolution: 12, ..Default::default() },
            clock.clone(),
            "encoder_left"
        ).unwrap());

        let pid = PidLoop::new(
            (-1000, 1000), (-100, 100), PidGains::new((1, 10), (0, 1), (0, 1)), "pid_left"
        ).unwrap();
        let driver = MotorDriver::new(
            MotorDriverConfig {
                invert_direction: false,
                min_rpm: -1000,
                max_rpm: 1000,
                min_commanded_rpm: -100,
                max_commanded_rpm: 100
            },
            VirtualMotor::new("virtual_motor_left"),
            "motor_driver_left"
        ).unwrap()
            .with_encoder(encoder.clone())
            .with_control_loop(Box::new(pid));
        let right = MotorDriver::new(
            MotorDriverConfig::default(), VirtualMotor::new("virtual_motor_right"), "right"
        ).unwrap();

        let mut d = Drive::new(
            MotorStack::with_encoder(driver, encoder.clone()),
            MotorStack::new(right),
            Box::new(Tank::new(RcChannel(1), RcChannel(3)))
        );

        // Half speed forward
        let sticks = Sticks([Some(1401), None, Some(991), None]);
        d.strategy_proc(&sticks);
        assert_eq!(d.left().driver.get_set_rpm(), 499);

        // Three quadrature cycles in 500 ms is 24 counts per second, 120 rpm
        for _ in 0..3 {
            for (la, lb) in [(true, false), (true, true), (false, true), (false, false)].iter() {
                a.set_level(*la);
                b.set_level(*lb);
                encoder.sample_channels();
            }
        }
        clock.advance_ms(500);

        let report = d.control_proc();
        assert_eq!(report.left.real_rpm, 120);
        assert_eq!(report.left.commanded_rpm, 37);
        assert_eq!(report.right.commanded_rpm, 0);
    }

    #[test]
    fn test_fault_disables_motor() {
        let fault = Arc::new(AtomicBool::new(false));
        let disables = Arc::new(AtomicU32::new(0));
        let left = MotorDriver::new(
            MotorDriverConfig::default(), FaultyHw(fault.clone(), disables.clone()), "left"
        ).unwrap();
        let right = MotorDriver::new(
            MotorDriverConfig::default(), VirtualMotor::new("virtual_motor_right"), "right"
        ).unwrap();
        let mut d = Drive::new(
            MotorStack::new(left),
            MotorStack::new(right),
            Box::new(Tank::new(RcChannel(1), RcChannel(3)))
        );

        fault.store(true, Ordering::SeqCst);
        let report = d.control_proc();
        assert!(report.left.disabled);
        assert_eq!(report.left.fault_status, FaultStatus::OverCurrent);
        assert_eq!(report.left.disable_mask, DisableReason::Fault.bit());
        assert!(!report.right.disabled);

        // De-energised once per cycle
        assert_eq!(disables.load(Ordering::SeqCst), 1);
        d.control_proc();
        assert_eq!(disables.load(Ordering::SeqCst), 2);

        fault.store(false, Ordering::SeqCst);
        let report = d.control_proc();
        assert!(!report.left.disabled);
    }
}
