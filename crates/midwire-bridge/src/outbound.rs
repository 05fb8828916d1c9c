use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use midwire_frame::{encode_frame, write_encoded, FrameConfig, FrameError};

use crate::signal::StopSignal;
use crate::stats::BridgeStats;
use crate::transform::PayloadTransform;

/// Encoding scratch space per pump, as a multiple of the max payload size.
///
/// Plain chunks need `2 * max + 1` bytes. Transformed chunks may grow, and
/// are accepted as long as their frame still fits this buffer.
pub const SCRATCH_FACTOR: usize = 4;

/// The middleware's stdin, shared by every outbound pump.
///
/// Each frame is written in full while the lock is held, so frames from
/// concurrent pumps never interleave.
pub struct SharedInput<W> {
    inner: Arc<Mutex<Option<W>>>,
}

impl<W> Clone for SharedInput<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedInput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    /// Write one encoded frame. Fails with `ConnectionClosed` once closed.
    pub fn write_frame(&self, encoded: &[u8]) -> Result<(), FrameError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(writer) => write_encoded(writer, encoded),
            None => Err(FrameError::ConnectionClosed),
        }
    }

    /// Drop the writer if no pump is mid-write. Returns whether it closed.
    pub fn try_close(&self) -> bool {
        match self.inner.try_lock() {
            Ok(mut guard) => {
                drop(guard.take());
                true
            }
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                drop(poisoned.into_inner().take());
                true
            }
            Err(std::sync::TryLockError::WouldBlock) => false,
        }
    }

    /// Drop the writer, waiting for any in-flight frame.
    pub fn close(&self) {
        drop(
            self.inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Copies raw chunks from one source into the middleware's stdin.
///
/// Every successful read becomes one frame. Chunks longer than the max
/// payload are dropped whole, never split: after an oversized read the pump
/// keeps discarding until a read comes back short, and counts the run as one
/// drop.
pub struct OutboundPump<R, W> {
    source: R,
    input: SharedInput<W>,
    stop: StopSignal,
    stats: Arc<BridgeStats>,
    config: FrameConfig,
    transform: Option<Arc<dyn PayloadTransform>>,
    label: String,
}

impl<R: Read, W: Write> OutboundPump<R, W> {
    pub fn new(
        source: R,
        input: SharedInput<W>,
        stop: StopSignal,
        stats: Arc<BridgeStats>,
        config: FrameConfig,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source,
            input,
            stop,
            stats,
            config,
            transform: None,
            label: label.into(),
        }
    }

    /// Reformat every chunk with `transform` before it is framed.
    pub fn with_transform(mut self, transform: Option<Arc<dyn PayloadTransform>>) -> Self {
        self.transform = transform;
        self
    }

    /// Pump until the source ends, the stop signal fires, or stdin closes.
    pub fn run(mut self) {
        let max = self.config.max_payload_size;
        // One spare byte so an oversized read is visible as such.
        let mut chunk = vec![0u8; max + 1];
        let mut scratch = BytesMut::with_capacity(SCRATCH_FACTOR * max);
        let mut discarding = false;

        tracing::debug!(source = %self.label, "outbound pump started");

        loop {
            let n = match self.source.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!(source = %self.label, "source reached end of input");
                    break;
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(source = %self.label, error = %err, "source read failed");
                    break;
                }
            };

            if self.stop.is_fired() {
                break;
            }

            if n > max {
                if !discarding {
                    discarding = true;
                    self.stats.record_dropped();
                    tracing::debug!(
                        source = %self.label,
                        max_payload = max,
                        "dropping chunk larger than max payload"
                    );
                }
                continue;
            }
            if discarding {
                // Tail of the oversized chunk.
                discarding = false;
                continue;
            }

            let transformed;
            let (payload, limit) = match &self.transform {
                Some(transform) => {
                    transformed = transform.transform(&chunk[..n]);
                    (transformed.as_slice(), (SCRATCH_FACTOR * max - 1) / 2)
                }
                None => (&chunk[..n], max),
            };

            if payload.is_empty() {
                tracing::trace!(source = %self.label, "skipping empty chunk");
                continue;
            }

            scratch.clear();
            if let Err(err) = encode_frame(payload, limit, &mut scratch) {
                self.stats.record_dropped();
                tracing::debug!(source = %self.label, error = %err, "dropping chunk");
                continue;
            }

            match self.input.write_frame(&scratch) {
                Ok(()) => {}
                Err(FrameError::ConnectionClosed) => {
                    tracing::debug!(source = %self.label, "middleware input closed");
                    break;
                }
                Err(err) => {
                    tracing::warn!(source = %self.label, error = %err, "write to middleware failed");
                    break;
                }
            }

            self.stats.record_sent(payload.len());
            tracing::trace!(
                source = %self.label,
                size = payload.len(),
                payload = %String::from_utf8_lossy(payload),
                "sent to middleware"
            );
        }

        tracing::debug!(source = %self.label, "outbound pump stopped");
    }
}
