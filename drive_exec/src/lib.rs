//! # Combat Drive library
//!
//! Control core of a two-motor combat robot drivetrain. Radio control input
//! is mixed by a drive strategy into per-motor speed targets, which each
//! motor driver turns into a bounded hardware command, optionally closing the
//! loop on a quadrature encoder. A failsafe mask gates all of it.
//!
//! # Modules
//!
//! - `control_loop` - generic saturating control loop and its PID variant.
//! - `encoder` - quadrature decoder and rate estimator.
//! - `motor_driver` - per-motor state machine and hardware backends.
//! - `failsafe` - the failsafe mask and arm switch.
//! - `rc` - radio control channel interface.
//! - `drive_strategy` - arcade and tank mixers.
//! - `drive` - assembly of the above into a left/right drivetrain.
//! - `params` - parameters of the drive executable.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod control_loop;
pub mod drive;
pub mod drive_strategy;
pub mod encoder;
pub mod failsafe;
pub mod motor_driver;
pub mod params;
pub mod rc;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Rotational speed in revolutions per minute. Also used for the commanded
/// domain of a motor, which need not be a physical speed.
pub type Rpm = i32;
