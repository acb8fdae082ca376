//! [`MotorHw`] implementation for a PWM driven H-bridge
//!
//! The bridge has two PWM inputs and an active-low sleep input, and may have
//! an active-low fault output:
//!
//! | IN1 | IN2 | Effect                  |
//! |-----|-----|-------------------------|
//! | PWM | 0   | Forward at PWM duty     |
//! | 0   | PWM | Reverse at PWM duty     |
//! | 0   | 0   | Brake, outputs grounded |

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use embedded_hal::{digital::v2::OutputPin, PwmPin};

use super::{FaultStatus, MotorCommand, MotorHw, MotorHwError};
use crate::encoder::ChannelPin;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A motor on a PWM driven H-bridge.
pub struct HBridgeMotor<IN1, IN2, SLP> {
    in1: IN1,
    in2: IN2,
    sleep_bar: SLP,
    fault_bar: Option<Box<dyn ChannelPin>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<IN1, IN2, SLP> HBridgeMotor<IN1, IN2, SLP>
where
    IN1: PwmPin<Duty = u16> + Send,
    IN2: PwmPin<Duty = u16> + Send,
    SLP: OutputPin + Send
{
    /// Take control of the bridge's pins, leaving the bridge asleep.
    pub fn new(in1: IN1, in2: IN2, sleep_bar: SLP) -> Result<Self, MotorHwError> {
        let mut motor = Self {
            in1,
            in2,
            sleep_bar,
            fault_bar: None
        };

        motor.in1.enable();
        motor.in2.enable();
        motor.disable_motor()?;

        Ok(motor)
    }

    /// Report faults from the bridge's fault output.
    pub fn with_fault_pin<F>(mut self, fault_bar: F) -> Self
    where
        F: ChannelPin + 'static
    {
        self.fault_bar = Some(Box::new(fault_bar));
        self
    }
}

impl<IN1, IN2, SLP> MotorHw for HBridgeMotor<IN1, IN2, SLP>
where
    IN1: PwmPin<Duty = u16> + Send,
    IN2: PwmPin<Duty = u16> + Send,
    SLP: OutputPin + Send
{
    fn disable_motor(&mut self) -> Result<(), MotorHwError> {
        self.sleep_bar.set_low().map_err(|_| MotorHwError::PinWrite("sleep"))?;
        self.in1.set_duty(0);
        self.in2.set_duty(0);

        Ok(())
    }

    fn command_motor(&mut self, command: &MotorCommand) -> Result<(), MotorHwError> {
        let commanded = command.commanded_rpm as i64;
        let neutral = command.neutral_commanded_rpm as i64;

        if commanded > neutral {
            let max_duty = self.in1.get_max_duty();
            let range = command.max_commanded_rpm as i64 - neutral;
            self.in1.set_duty(scale_duty(commanded - neutral, range, max_duty));
            self.in2.set_duty(0);
        }
        else if commanded < neutral {
            let max_duty = self.in2.get_max_duty();
            let range = neutral - command.min_commanded_rpm as i64;
            self.in1.set_duty(0);
            self.in2.set_duty(scale_duty(neutral - commanded, range, max_duty));
        }
        else {
            self.in1.set_duty(0);
            self.in2.set_duty(0);
        }

        self.sleep_bar.set_high().map_err(|_| MotorHwError::PinWrite("sleep"))
    }

    fn get_fault_status(&self) -> FaultStatus {
        match self.fault_bar.as_ref().and_then(|p| p.level()) {
            Some(false) => FaultStatus::Fault,
            _ => FaultStatus::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale a positive offset from neutral into a duty.
fn scale_duty(offset: i64, range: i64, max_duty: u16) -> u16 {
    if range <= 0 {
        return 0
    }

    let duty = offset * max_duty as i64 / range;
    duty.max(0).min(max_duty as i64) as u16
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoder::SimPin;
    use std::convert::Infallible;
    use std::sync::{
        atomic::{AtomicBool, AtomicU16, Ordering},
        Arc
    };

    const MAX_DUTY: u16 = 1000;

    #[derive(Clone, Default)]
    struct MockPwm {
        duty: Arc<AtomicU16>,
        enabled: Arc<AtomicBool>
    }

    impl PwmPin for MockPwm {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled.store(false, Ordering::SeqCst);
        }

        fn enable(&mut self) {
            self.enabled.store(true, Ordering::SeqCst);
        }

        fn get_duty(&self) -> u16 {
            self.duty.load(Ordering::SeqCst)
        }

        fn get_max_duty(&self) -> u16 {
            MAX_DUTY
        }

        fn set_duty(&mut self, duty: u16) {
            self.duty.store(duty, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct MockOut(Arc<AtomicBool>);

    impl OutputPin for MockOut {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenOut;

    impl OutputPin for BrokenOut {
        type Error = ();

        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(())
        }
    }

    fn command(commanded_rpm: i32) -> MotorCommand {
        MotorCommand {
            set_rpm: 0,
            commanded_rpm,
            min_commanded_rpm: -100,
            neutral_commanded_rpm: 0,
            max_commanded_rpm: 200
        }
    }

    #[test]
    fn test_command() {
        let (in1, in2, sleep) = (MockPwm::default(), MockPwm::default(), MockOut::default());
        sleep.0.store(true, Ordering::SeqCst);

        let mut motor = HBridgeMotor::new(in1.clone(), in2.clone(), sleep.clone()).unwrap();
        assert!(in1.enabled.load(Ordering::SeqCst));
        assert!(!sleep.0.load(Ordering::SeqCst));

        motor.command_motor(&command(100)).unwrap();
        assert_eq!(in1.get_duty(), 500);
        assert_eq!(in2.get_duty(), 0);
        assert!(sleep.0.load(Ordering::SeqCst));

        // Each side of neutral has its own scale
        motor.command_motor(&command(-50)).unwrap();
        assert_eq!(in1.get_duty(), 0);
        assert_eq!(in2.get_duty(), 500);

        motor.command_motor(&command(-100)).unwrap();
        assert_eq!(in2.get_duty(), MAX_DUTY);

        motor.command_motor(&command(0)).unwrap();
        assert_eq!(in1.get_duty(), 0);
        assert_eq!(in2.get_duty(), 0);
        assert!(sleep.0.load(Ordering::SeqCst));

        motor.command_motor(&command(200)).unwrap();
        assert_eq!(in1.get_duty(), MAX_DUTY);
        motor.disable_motor().unwrap();
        assert_eq!(in1.get_duty(), 0);
        assert!(!sleep.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fault_pin() {
        let motor = HBridgeMotor::new(
            MockPwm::default(), MockPwm::default(), MockOut::default()
        ).unwrap();
        assert_eq!(motor.get_fault_status(), FaultStatus::Unknown);

        let fault = SimPin::new(true);
        let motor = motor.with_fault_pin(fault.clone());
        assert_eq!(motor.get_fault_status(), FaultStatus::Unknown);

        fault.set_level(false);
        assert_eq!(motor.get_fault_status(), FaultStatus::Fault);
    }

    #[test]
    fn test_sleep_pin_error() {
        let result = HBridgeMotor::new(MockPwm::default(), MockPwm::default(), BrokenOut);
        assert!(matches!(result, Err(MotorHwError::PinWrite("sleep"))));
    }
}
