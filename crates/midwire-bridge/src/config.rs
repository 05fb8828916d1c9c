use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use midwire_frame::FrameConfig;
use midwire_process::{ExitPolicy, ShutdownGrace};

use crate::outbound::SCRATCH_FACTOR;
use crate::transform::PayloadTransform;

/// Default response queue capacity, in payloads.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default time `close` waits for background threads.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`Bridge`](crate::Bridge).
#[derive(Clone)]
pub struct BridgeConfig {
    /// Frame limits. `max_payload_size` is also the outbound chunk limit.
    pub frame: FrameConfig,
    /// Maximum decoded payloads waiting to be read.
    pub queue_capacity: usize,
    /// Run outbound chunks through `transform` before framing.
    pub prettify: bool,
    /// Reformatter used when `prettify` is set.
    pub transform: Option<Arc<dyn PayloadTransform>>,
    /// What to do when the middleware dies on its own.
    pub exit_policy: ExitPolicy,
    /// Grace periods for stopping the middleware on close.
    pub shutdown: ShutdownGrace,
    /// How long `close` waits for background threads to exit.
    pub join_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            prettify: false,
            transform: None,
            exit_policy: ExitPolicy::default(),
            shutdown: ShutdownGrace::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    pub fn with_max_payload(mut self, max_payload_size: usize) -> Self {
        self.frame.max_payload_size = max_payload_size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Install a reformatter and enable prettification.
    pub fn with_transform(mut self, transform: impl PayloadTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self.prettify = true;
        self
    }

    pub fn with_prettify(mut self, prettify: bool) -> Self {
        self.prettify = prettify;
        self
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: ShutdownGrace) -> Self {
        self.shutdown = grace;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Frame limits for middleware replies.
    ///
    /// Replies may echo a transformed chunk, which can outgrow the outbound
    /// limit, so they are bounded by the outbound scratch size instead.
    pub(crate) fn inbound_frame(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.frame.max_payload_size.saturating_mul(SCRATCH_FACTOR),
        }
    }

    /// The transform pumps should apply, if any.
    pub(crate) fn active_transform(&self) -> Option<Arc<dyn PayloadTransform>> {
        if self.prettify {
            self.transform.clone()
        } else {
            None
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("frame", &self.frame)
            .field("queue_capacity", &self.queue_capacity)
            .field("prettify", &self.prettify)
            .field(
                "transform",
                &self.transform.as_ref().map(|_| "<transform>"),
            )
            .field("exit_policy", &self.exit_policy)
            .field("shutdown", &self.shutdown)
            .field("join_timeout", &self.join_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.queue_capacity, 1000);
        assert_eq!(cfg.frame.max_payload_size, 5 * 1024 * 1024);
        assert!(!cfg.prettify);
        assert!(cfg.transform.is_none());
        assert_eq!(cfg.exit_policy, ExitPolicy::Terminate);
        assert_eq!(cfg.join_timeout, DEFAULT_JOIN_TIMEOUT);
    }

    #[test]
    fn inbound_limit_covers_transformed_chunks() {
        let cfg = BridgeConfig::default().with_max_payload(16);
        assert_eq!(cfg.inbound_frame().max_payload_size, 64);

        let cfg = BridgeConfig::default().with_max_payload(usize::MAX);
        assert_eq!(cfg.inbound_frame().max_payload_size, usize::MAX);
    }

    #[test]
    fn transform_only_active_when_prettify_set() {
        let cfg = BridgeConfig::default().with_transform(|p: &[u8]| p.to_ascii_uppercase());
        assert!(cfg.active_transform().is_some());

        let cfg = cfg.with_prettify(false);
        assert!(cfg.active_transform().is_none());
    }

    #[test]
    fn debug_hides_transform() {
        let cfg = BridgeConfig::default().with_transform(|p: &[u8]| p.to_vec());
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("<transform>"));
    }
}
