use std::fmt;
use std::io;

use midwire_bridge::BridgeError;
use midwire_frame::FrameError;
use midwire_process::ProcessError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PROCESS_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// 128 + SIGINT.
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn process_error(context: &str, err: ProcessError) -> CliError {
    match err {
        ProcessError::EmptyCommand => CliError::new(USAGE, format!("{context}: {err}")),
        ProcessError::Unresponsive { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ProcessError::WaitThread(source) => io_error(context, source),
        other => CliError::new(PROCESS_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. }
        | FrameError::OddLength { .. }
        | FrameError::InvalidHex { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Process(err) => process_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::ShutdownIncomplete { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        BridgeError::Stopped | BridgeError::OutputClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_is_process_error() {
        let err = ProcessError::Spawn {
            program: "missing".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = bridge_error("start failed", BridgeError::Process(err));
        assert_eq!(cli.code, PROCESS_ERROR);
        assert!(cli.message.starts_with("start failed: "));
    }

    #[test]
    fn empty_command_is_usage_error() {
        let cli = process_error("start failed", ProcessError::EmptyCommand);
        assert_eq!(cli.code, USAGE);
    }

    #[test]
    fn decode_errors_are_data_invalid() {
        let cli = frame_error("read failed", FrameError::OddLength { len: 3 });
        assert_eq!(cli.code, DATA_INVALID);
    }

    #[test]
    fn incomplete_shutdown_is_timeout() {
        let cli = bridge_error("close failed", BridgeError::ShutdownIncomplete { running: 2 });
        assert_eq!(cli.code, TIMEOUT);
    }
}
