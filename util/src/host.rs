//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
///
/// The `params` and `sessions` directories are resolved relative to this.
pub const SW_ROOT_ENV_VAR: &str = "COMBAT_DRIVE_SW_ROOT";

/// Get the path to the software root directory.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get the name of the machine this executable is running on, if known.
pub fn get_hostname() -> Option<String> {
    match env::var("HOSTNAME") {
        Ok(h) => Some(h),
        Err(_) => std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
