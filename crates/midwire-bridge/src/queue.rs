use bytes::Bytes;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};

use crate::error::{BridgeError, Result};
use crate::signal::StopSignal;

/// Consumer side of the bounded FIFO between the inbound pump and readers.
///
/// The queue is disconnected once its [`QueueProducer`] is dropped; payloads
/// already queued are still delivered before [`BridgeError::OutputClosed`].
pub struct ResponseQueue {
    rx: Receiver<Bytes>,
    capacity: usize,
}

/// Producer side, owned by the inbound pump.
pub struct QueueProducer {
    tx: Sender<Bytes>,
}

impl ResponseQueue {
    /// Create a queue holding at most `capacity` payloads.
    pub fn bounded(capacity: usize) -> (Self, QueueProducer) {
        let (tx, rx) = bounded(capacity);
        (Self { rx, capacity }, QueueProducer { tx })
    }

    /// Take the next payload, blocking until one arrives or `stop` fires.
    ///
    /// A fired signal wins over queued data.
    pub fn pop(&self, stop: &StopSignal) -> Result<Bytes> {
        if stop.is_fired() {
            return Err(BridgeError::Stopped);
        }

        select! {
            recv(self.rx) -> payload => payload.map_err(|_| BridgeError::OutputClosed),
            recv(stop.receiver()) -> _ => Err(BridgeError::Stopped),
        }
    }

    /// Take the next payload without blocking.
    pub fn try_pop(&self) -> Result<Option<Bytes>> {
        match self.rx.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BridgeError::OutputClosed),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl QueueProducer {
    /// Enqueue a payload, blocking while the queue is full.
    ///
    /// Returns [`BridgeError::Stopped`] if `stop` fires first (the payload is
    /// dropped) or if the consumer side is gone.
    pub fn push(&self, payload: Bytes, stop: &StopSignal) -> Result<()> {
        if stop.is_fired() {
            return Err(BridgeError::Stopped);
        }

        select! {
            send(self.tx, payload) -> sent => sent.map_err(|_| BridgeError::Stopped),
            recv(stop.receiver()) -> _ => Err(BridgeError::Stopped),
        }
    }
}
