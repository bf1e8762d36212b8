//! Signal names used by `StopTask` and `SignalTask`.

use crate::{DriverError, Result};

/// Signal used by `StopTask` when the caller passes an empty name.
pub const DEFAULT_KILL_SIGNAL: &str = "SIGINT";

pub const SIGHUP: i32 = 1;
pub const SIGINT: i32 = 2;
pub const SIGQUIT: i32 = 3;
pub const SIGKILL: i32 = 9;
pub const SIGUSR1: i32 = 10;
pub const SIGUSR2: i32 = 12;
pub const SIGTERM: i32 = 15;

/// Translate a signal name to its number.
///
/// Accepts names with or without the `SIG` prefix, in any case.
pub fn signal_number(name: &str) -> Result<i32> {
    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    match bare {
        "HUP" => Ok(SIGHUP),
        "INT" => Ok(SIGINT),
        "QUIT" => Ok(SIGQUIT),
        "KILL" => Ok(SIGKILL),
        "USR1" => Ok(SIGUSR1),
        "USR2" => Ok(SIGUSR2),
        "TERM" => Ok(SIGTERM),
        _ => Err(DriverError::invalid_config(format!("unknown signal {name:?}"))),
    }
}

/// Returns true for signals conventionally used to stop a workload.
///
/// `SIGHUP` is excluded: workloads treat it as a reload request.
pub fn is_terminating(signal: i32) -> bool {
    matches!(signal, SIGINT | SIGQUIT | SIGKILL | SIGTERM)
}
