/// Errors that can occur while supervising the middleware process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The command string contained no program token.
    #[error("middleware command is empty")]
    EmptyCommand,

    /// The program could not be started.
    #[error("failed to spawn middleware '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A stdio pipe was not created or has already been taken.
    #[error("middleware {0} pipe unavailable")]
    PipeUnavailable(&'static str),

    /// The background wait thread could not be started.
    #[error("failed to start wait thread: {0}")]
    WaitThread(std::io::Error),

    /// The process survived the whole termination sequence.
    #[error("middleware (pid {pid}) did not exit after SIGKILL")]
    Unresponsive { pid: u32 },

    /// An I/O error occurred on a process stream.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessError>;
