/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Empty payloads are never framed.
    #[error("empty payload")]
    EmptyPayload,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A frame had an odd number of hex digits.
    #[error("odd-length frame ({len} hex digits)")]
    OddLength { len: usize },

    /// A frame contained a byte that is not a hex digit.
    #[error("invalid hex byte 0x{byte:02x} at offset {offset}")]
    InvalidHex { offset: usize, byte: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended. Any incomplete trailing frame is discarded.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that only affect one frame; the stream is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OddLength { .. } | Self::InvalidHex { .. } | Self::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
