use std::io::Read;
use std::sync::Arc;

use midwire_frame::{FrameError, FrameReader};

use crate::queue::QueueProducer;
use crate::signal::StopSignal;
use crate::stats::BridgeStats;

/// Decodes frames from the middleware's stdout into the response queue.
///
/// Malformed frames are logged and skipped. Dropping the pump (on return)
/// drops the queue producer, which is how readers learn the output closed.
pub struct InboundPump<R> {
    reader: FrameReader<R>,
    queue: QueueProducer,
    stop: StopSignal,
    stats: Arc<BridgeStats>,
}

impl<R: Read> InboundPump<R> {
    pub fn new(
        reader: FrameReader<R>,
        queue: QueueProducer,
        stop: StopSignal,
        stats: Arc<BridgeStats>,
    ) -> Self {
        Self {
            reader,
            queue,
            stop,
            stats,
        }
    }

    pub fn run(mut self) {
        tracing::debug!("inbound pump started");

        loop {
            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::ConnectionClosed) => {
                    tracing::debug!("middleware output closed");
                    break;
                }
                Err(err) if err.is_recoverable() => {
                    self.stats.record_decode_error();
                    tracing::warn!(error = %err, "skipping malformed frame from middleware");
                    continue;
                }
                Err(err) => {
                    tracing::error!(error = %err, "reading middleware output failed");
                    break;
                }
            };

            if self.stop.is_fired() {
                break;
            }
            if frame.is_empty() {
                continue;
            }

            let size = frame.payload.len();
            self.stats.record_received(size);
            tracing::trace!(
                size,
                payload = %String::from_utf8_lossy(&frame.payload),
                "received from middleware"
            );

            if self.queue.push(frame.payload, &self.stop).is_err() {
                break;
            }
        }

        tracing::debug!("inbound pump stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use midwire_frame::FrameConfig;

    use super::*;
    use crate::error::BridgeError;
    use crate::queue::ResponseQueue;

    fn run(wire: &[u8], max: usize) -> (ResponseQueue, Arc<BridgeStats>) {
        let stop = StopSignal::new();
        let stats = Arc::new(BridgeStats::default());
        let (queue, producer) = ResponseQueue::bounded(16);
        let reader = FrameReader::with_config(
            Cursor::new(wire.to_vec()),
            FrameConfig {
                max_payload_size: max,
            },
        );
        InboundPump::new(reader, producer, stop, Arc::clone(&stats)).run();
        (queue, stats)
    }

    fn drain(queue: &ResponseQueue) -> Vec<Vec<u8>> {
        let stop = StopSignal::new();
        let mut out = Vec::new();
        loop {
            match queue.pop(&stop) {
                Ok(payload) => out.push(payload.to_vec()),
                Err(BridgeError::OutputClosed) => return out,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn decodes_frames_in_order() {
        let (queue, stats) = run(b"6f6e65\n74776f\n", 64);
        assert_eq!(drain(&queue), vec![b"one".to_vec(), b"two".to_vec()]);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.bytes_received, 6);
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let (queue, stats) = run(b"zz\n616\n6f6b\n", 64);
        assert_eq!(drain(&queue), vec![b"ok".to_vec()]);
        assert_eq!(stats.snapshot().decode_errors, 2);
    }

    #[test]
    fn empty_frames_are_not_delivered() {
        let (queue, stats) = run(b"\n\n6869\n", 64);
        assert_eq!(drain(&queue), vec![b"hi".to_vec()]);
        assert_eq!(stats.snapshot().frames_received, 1);
    }

    #[test]
    fn oversized_frame_is_skipped() {
        let mut wire = b"61".repeat(10);
        wire.extend_from_slice(b"\n6869\n");
        let (queue, stats) = run(&wire, 4);
        assert_eq!(drain(&queue), vec![b"hi".to_vec()]);
        assert_eq!(stats.snapshot().decode_errors, 1);
    }

    #[test]
    fn end_of_output_closes_queue() {
        let (queue, _) = run(b"", 64);
        assert!(matches!(
            queue.pop(&StopSignal::new()),
            Err(BridgeError::OutputClosed)
        ));
    }

    #[test]
    fn fired_stop_discards_output() {
        let stop = StopSignal::new();
        stop.fire();
        let (queue, producer) = ResponseQueue::bounded(4);
        let reader = FrameReader::new(Cursor::new(b"6869\n".to_vec()));
        InboundPump::new(reader, producer, stop, Arc::new(BridgeStats::default())).run();

        assert!(matches!(queue.try_pop(), Err(BridgeError::OutputClosed)));
    }
}
