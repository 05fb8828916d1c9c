use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the pumps of one bridge.
#[derive(Debug, Default)]
pub struct BridgeStats {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    chunks_dropped: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    decode_errors: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames written to the middleware.
    pub frames_sent: u64,
    /// Payload bytes (before encoding) written to the middleware.
    pub bytes_sent: u64,
    /// Outbound chunks dropped for size.
    pub chunks_dropped: u64,
    /// Frames decoded from the middleware's output.
    pub frames_received: u64,
    /// Payload bytes decoded from the middleware's output.
    pub bytes_received: u64,
    /// Inbound frames that failed to decode.
    pub decode_errors: u64,
}

impl BridgeStats {
    pub fn record_sent(&self, payload_len: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self, payload_len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}
