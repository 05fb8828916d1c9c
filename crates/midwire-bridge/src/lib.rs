//! Duplex bridge between captured traffic and an external middleware process.
//!
//! Raw chunks from any number of attached sources are hex-framed onto the
//! middleware's stdin; frames coming back on its stdout are decoded into a
//! bounded queue and handed out through [`Bridge::read`].
//!
//! ```text
//! source ──▶ OutboundPump ──▶ stdin ─▶ [middleware] ─▶ stdout ──▶ InboundPump ──▶ ResponseQueue ──▶ read()
//! source ──▶ OutboundPump ──┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod queue;
pub mod signal;
pub mod stats;
pub mod transform;

mod tasks;

pub use bridge::Bridge;
pub use config::{BridgeConfig, DEFAULT_JOIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
pub use error::{BridgeError, Result};
pub use inbound::InboundPump;
pub use outbound::{OutboundPump, SharedInput, SCRATCH_FACTOR};
pub use queue::{QueueProducer, ResponseQueue};
pub use signal::StopSignal;
pub use stats::{BridgeStats, StatsSnapshot};
pub use transform::PayloadTransform;
