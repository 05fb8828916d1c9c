/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The bridge was closed. This is the error callers branch on.
    #[error("bridge stopped")]
    Stopped,

    /// The middleware closed its output and every queued payload was consumed.
    #[error("middleware output closed")]
    OutputClosed,

    /// Process supervision error.
    #[error("process error: {0}")]
    Process(#[from] midwire_process::ProcessError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] midwire_frame::FrameError),

    /// A background thread could not be started.
    #[error("failed to start {task} thread: {source}")]
    Spawn {
        task: String,
        source: std::io::Error,
    },

    /// Background tasks were still running when the join deadline passed.
    #[error("shutdown incomplete: {running} background task(s) still running")]
    ShutdownIncomplete { running: usize },
}

impl BridgeError {
    /// True if the bridge was closed.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// True if no more payloads will ever be delivered.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Stopped | Self::OutputClosed)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
