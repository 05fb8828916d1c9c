use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig, DELIMITER};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Malformed or oversized frames are reported one at a time; the reader
/// resynchronizes on the next delimiter, so the caller may keep reading.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    scanned: usize,
    discarding: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            scanned: 0,
            discarding: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached; that
    /// state is terminal. Decode errors consume the offending line only.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(pos) = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == DELIMITER)
            {
                let line = self.buf.split_to(self.scanned + pos + 1);
                self.scanned = 0;

                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if line.len() > self.config.max_frame_len() {
                    return Err(FrameError::PayloadTooLarge {
                        size: (line.len() - 1) / 2,
                        max: self.config.max_payload_size,
                    });
                }
                return decode_frame(&line).map(Frame::new);
            }
            self.scanned = self.buf.len();

            if self.buf.len() >= self.config.max_frame_len() {
                let buffered = self.buf.len();
                self.buf.clear();
                self.scanned = 0;

                if !self.discarding {
                    self.discarding = true;
                    return Err(FrameError::PayloadTooLarge {
                        size: buffered / 2,
                        max: self.config.max_payload_size,
                    });
                }
            }

            if self.fill()? == 0 {
                if !self.buf.is_empty() && !self.discarding {
                    tracing::debug!(
                        bytes = self.buf.len(),
                        "discarding incomplete frame at end of stream"
                    );
                }
                self.buf.clear();
                self.scanned = 0;
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    fn fill(&mut self) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK_SIZE, 0);

        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(FrameError::Io(err));
                }
            }
        }
    }
}
