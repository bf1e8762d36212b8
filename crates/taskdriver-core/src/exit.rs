//! Terminal task outcomes.

use crate::stream::StreamItem;
use crate::DriverError;
use serde::{Deserialize, Serialize};

/// Terminal outcome of a task or of an exec'd command.
///
/// `err` reports that the *driver* could not determine the outcome; it is
/// orthogonal to `exit_code` and `signal` and must be checked first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitResult {
    /// Process exit code.
    pub exit_code: i32,

    /// Signal that killed the process, 0 if none.
    pub signal: i32,

    /// The task was killed for exceeding its memory limit.
    pub oom_killed: bool,

    /// Driver failure while determining the outcome.
    pub err: Option<DriverError>,
}

impl ExitResult {
    /// Create an exit result from a code and signal.
    pub fn new(exit_code: i32, signal: i32) -> Self {
        Self {
            exit_code,
            signal,
            ..Default::default()
        }
    }

    /// Result of a task killed by a signal.
    pub fn signaled(signal: i32) -> Self {
        Self::new(128 + signal, signal)
    }

    /// Returns true if the outcome is known and clean.
    pub fn successful(&self) -> bool {
        self.err.is_none() && self.exit_code == 0 && self.signal == 0
    }

    /// Returns true if the outcome is known (the driver did not fail).
    pub fn is_determined(&self) -> bool {
        self.err.is_none()
    }
}

impl StreamItem for ExitResult {
    fn from_error(err: DriverError) -> Self {
        Self {
            err: Some(err),
            ..Default::default()
        }
    }

    fn error(&self) -> Option<&DriverError> {
        self.err.as_ref()
    }

    /// A task exits once; any exit result ends the wait stream.
    fn is_terminal(&self) -> bool {
        true
    }
}
