//! Process lifecycle types: how the middleware ended, what to do about it,
//! and how long to wait while stopping it.

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

/// Exit code used when an unexpected middleware failure terminates the host.
pub const FATAL_EXIT_CODE: i32 = 1;

/// How the middleware process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Process exited normally with an exit code.
    Exited {
        /// The process exit code.
        code: i32,
    },
    /// Process was killed by a signal (Unix only).
    Signalled {
        /// The signal number that terminated the process.
        signal: i32,
    },
    /// Waiting on the process failed.
    WaitFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl ExitOutcome {
    /// Classify an exit status reported by the OS.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited { code };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signalled { signal };
            }
        }

        Self::WaitFailed {
            reason: format!("unrecognized exit status: {status}"),
        }
    }

    /// True only for a clean zero exit.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 })
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exited with code {code}"),
            Self::Signalled { signal } => write!(f, "killed by signal {signal}"),
            Self::WaitFailed { reason } => write!(f, "wait failed: {reason}"),
        }
    }
}

/// What the wait thread does when the middleware fails on its own.
///
/// Exits that follow a shutdown request are always treated as expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Log the failure and end the host with [`FATAL_EXIT_CODE`].
    #[default]
    Terminate,
    /// Log the failure and keep running; the outcome is available from the handle.
    Report,
}

/// Grace periods for the termination sequence.
///
/// 1. Close the middleware's stdin
/// 2. Wait `stdin_close_grace` for a clean exit
/// 3. Send SIGTERM
/// 4. Wait `sigterm_grace`
/// 5. Send SIGKILL
#[derive(Debug, Clone)]
pub struct ShutdownGrace {
    /// Time to wait after closing stdin before sending SIGTERM.
    pub stdin_close_grace: Duration,
    /// Time to wait after SIGTERM before sending SIGKILL.
    pub sigterm_grace: Duration,
}

impl Default for ShutdownGrace {
    fn default() -> Self {
        Self {
            stdin_close_grace: Duration::from_secs(2),
            sigterm_grace: Duration::from_secs(2),
        }
    }
}

impl ShutdownGrace {
    /// Use the same grace period for both waiting steps.
    pub fn uniform(grace: Duration) -> Self {
        Self {
            stdin_close_grace: grace,
            sigterm_grace: grace,
        }
    }
}
