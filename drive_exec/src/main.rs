//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the failsafe mask (with `Boot` set) and the drive
//!     - Load the radio control script
//!     - Clear the `Boot` failsafe
//!     - Main loop:
//!         - Every `strategy_cycle_divisor` cycles:
//!             - Radio control input acquisition and monitoring
//!             - Arm switch processing
//!             - Drive strategy processing
//!         - Drive control processing
//!
//! The script given on the command line stands in for the radio receiver.
//! Execution ends when the script does.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, error, info, warn};
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{
    drive::{self, Drive},
    failsafe::{ArmSwitch, FailsafeMask, FailsafeReason},
    params::DriveExecParams,
    rc::{RcMonitor, RcScript, ScriptedReception}
};
use util::{
    host,
    logger::{level_from_str, logger_init},
    session::Session,
    time::{Clock, MonotonicClock}
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "drive_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // ---- LOAD PARAMETERS ----

    let exec_params: DriveExecParams = util::params::load(
        "drive_exec.toml"
    ).wrap_err("Could not load exec params")?;
    exec_params.are_valid().wrap_err("Invalid exec params")?;

    // Initialise logger
    logger_init(
        level_from_str(&exec_params.log_level).wrap_err("Invalid log level")?,
        &session
    ).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Combat Drive Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| String::from("unknown host"))
    );
    info!("Session directory: {:?}\n", session.session_root);

    let drive_params: drive::Params = util::params::load(
        "drive.toml"
    ).wrap_err("Could not load drive params")?;

    info!("Exec parameters loaded");

    // ---- LOAD SCRIPT ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected one argument (the RC script path), found {}", args.len() - 1
        ));
    }

    info!("Loading RC script from \"{}\"", &args[1]);
    let mut rc_script = RcScript::new(&args[1]).wrap_err("Failed to load RC script")?;

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let mask = Arc::new(FailsafeMask::new());

    let mut drive = Drive::from_params(&drive_params, mask.clone())
        .wrap_err("Failed to initialise the drive")?;
    info!("Drive init complete");

    let mut rc_monitor = RcMonitor::new(mask.clone(), clock.clone());
    let mut arm_switch = ArmSwitch::new(exec_params.arm_channel, mask.clone(), clock.clone());

    info!("Module initialisation complete\n");

    mask.clear(FailsafeReason::Boot);

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let script_start_instant = Instant::now();
    let mut num_cycles: u64 = 0;
    let mut num_consec_cycle_overruns: u64 = 0;

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- STRATEGY PROCESSING ----

        if exec_params.is_strategy_cycle(num_cycles) {
            match rc_script.proc(script_start_instant.elapsed().as_secs_f64()) {
                ScriptedReception::Frame { receiver_failsafe } => {
                    rc_monitor.proc(true, receiver_failsafe)
                },
                ScriptedReception::Silent => rc_monitor.proc(false, false),
                ScriptedReception::EndOfScript => {
                    info!("End of RC script reached, stopping");
                    break
                }
            }

            arm_switch.proc(&rc_script);
            drive.strategy_proc(&rc_script);
        }

        // ---- CONTROL PROCESSING ----

        let report = drive.control_proc();
        if report.left_hw_error || report.right_hw_error {
            warn!("Motor hardware error: {:?}", report);
        }
        else if log::log_enabled!(log::Level::Debug) {
            match serde_json::to_string(&report) {
                Ok(s) => debug!("Drive status: {}", s),
                Err(e) => warn!("Could not serialise the drive status: {}", e)
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > exec_params.max_consec_overruns {
                    error!(
                        "More than {} consecutive cycle overruns, stopping",
                        exec_params.max_consec_overruns
                    );
                    break
                }
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    // Leave the motors de-energised
    mask.set(FailsafeReason::Boot);
    drive.control_proc();

    info!("End of execution after {} cycles", num_cycles);

    Ok(())
}
