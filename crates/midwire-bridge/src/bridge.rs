use std::fmt;
use std::io::{self, Read};
use std::process::ChildStdin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Buf, Bytes};
use midwire_frame::FrameReader;
use midwire_process::{CommandLine, MiddlewareProcess};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::inbound::InboundPump;
use crate::outbound::{OutboundPump, SharedInput};
use crate::queue::ResponseQueue;
use crate::signal::StopSignal;
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::tasks::TaskSet;

/// Duplex handle to a running middleware.
///
/// The bridge is shared by reference: `attach`, `read` and `close` all take
/// `&self`, so one thread can feed sources while another drains responses.
///
/// # Example
///
/// ```no_run
/// use std::io::Cursor;
/// use midwire_bridge::Bridge;
///
/// let bridge = Bridge::spawn("cat")?;
/// bridge.attach(Cursor::new(b"GET / HTTP/1.1\r\n\r\n".to_vec()))?;
///
/// let mut buf = [0u8; 64];
/// let n = bridge.read(&mut buf)?;
/// assert_eq!(&buf[..n], b"GET / HTTP/1.1\r\n\r\n");
///
/// bridge.close()?;
/// # Ok::<(), midwire_bridge::BridgeError>(())
/// ```
pub struct Bridge {
    command: CommandLine,
    config: BridgeConfig,
    process: Mutex<MiddlewareProcess>,
    input: SharedInput<ChildStdin>,
    queue: ResponseQueue,
    pending: Mutex<Bytes>,
    stop: StopSignal,
    tasks: TaskSet,
    stats: Arc<BridgeStats>,
    next_source: AtomicU64,
}

impl Bridge {
    /// Start `command` as middleware with default configuration.
    pub fn spawn(command: &str) -> Result<Self> {
        Self::spawn_with_config(command, BridgeConfig::default())
    }

    /// Start `command` as middleware.
    ///
    /// The command line is split on whitespace; the first token is the
    /// program. The inbound pump starts before this returns, so output the
    /// middleware writes straight away is not lost.
    pub fn spawn_with_config(command: &str, config: BridgeConfig) -> Result<Self> {
        let command = CommandLine::parse(command)?;
        let mut process = MiddlewareProcess::spawn(&command, config.exit_policy)?;
        let pid = process.pid();
        let stdin = process.take_stdin()?;
        let stdout = process.take_stdout()?;

        if config.prettify && config.transform.is_none() {
            tracing::warn!("prettify enabled without a transform; chunks are sent unchanged");
        }

        let stop = StopSignal::new();
        let stats = Arc::new(BridgeStats::default());
        let tasks = TaskSet::new();
        let (queue, producer) = ResponseQueue::bounded(config.queue_capacity);

        let inbound = InboundPump::new(
            FrameReader::with_config(stdout, config.inbound_frame()),
            producer,
            stop.clone(),
            Arc::clone(&stats),
        );
        tasks.spawn(format!("midwire-inbound-{pid}"), move || inbound.run())?;

        tracing::info!(pid, command = %command, "bridge started");

        Ok(Self {
            command,
            config,
            process: Mutex::new(process),
            input: SharedInput::new(stdin),
            queue,
            pending: Mutex::new(Bytes::new()),
            stop,
            tasks,
            stats,
            next_source: AtomicU64::new(1),
        })
    }

    /// Feed `source` into the middleware on a new outbound pump.
    ///
    /// Returns immediately. Attaching to a closed bridge is a no-op.
    pub fn attach<R>(&self, source: R) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        if self.stop.is_fired() {
            tracing::debug!("bridge closed, ignoring attach");
            return Ok(());
        }

        let id = self.next_source.fetch_add(1, Ordering::Relaxed);
        let pump = OutboundPump::new(
            source,
            self.input.clone(),
            self.stop.clone(),
            Arc::clone(&self.stats),
            self.config.frame.clone(),
            format!("source-{id}"),
        )
        .with_transform(self.config.active_transform());

        match self
            .tasks
            .spawn(format!("midwire-outbound-{id}"), move || pump.run())
        {
            Err(BridgeError::Stopped) => {
                tracing::debug!("bridge closed, ignoring attach");
                Ok(())
            }
            other => other,
        }
    }

    /// Read response bytes into `buf`.
    ///
    /// Blocks until a payload is available or the bridge is closed. A payload
    /// larger than `buf` is handed out over several calls.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.stop.is_fired() {
            return Err(BridgeError::Stopped);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_empty() {
            *pending = self.queue.pop(&self.stop)?;
        }

        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        pending.advance(n);
        Ok(n)
    }

    /// Receive the next whole payload, or what is left of a partly read one.
    pub fn recv(&self) -> Result<Bytes> {
        if self.stop.is_fired() {
            return Err(BridgeError::Stopped);
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.is_empty() {
            return Ok(std::mem::take(&mut *pending));
        }
        self.queue.pop(&self.stop)
    }

    /// Close the middleware's stdin without stopping the bridge.
    ///
    /// Use once every source is exhausted: the middleware sees end of input,
    /// and its remaining output can still be read until `OutputClosed`.
    /// Pumps still attached stop at their next frame.
    pub fn close_input(&self) {
        tracing::debug!(command = %self.command, "closing middleware input");
        self.input.close();
    }

    /// Shut the bridge down.
    ///
    /// Fires the stop signal, stops the middleware (stdin close, SIGTERM,
    /// SIGKILL) and joins background threads up to the configured timeout.
    /// Only the first call does anything.
    pub fn close(&self) -> Result<()> {
        if !self.stop.fire() {
            return Ok(());
        }

        tracing::info!(command = %self.command, "closing bridge");

        // A pump mid-write keeps the lock; it is released once the process dies.
        self.input.try_close();

        let terminated = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .terminate(&self.config.shutdown);

        match &terminated {
            Ok(outcome) => {
                tracing::debug!(%outcome, "middleware stopped");
                self.input.close();
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to stop middleware");
                self.input.try_close();
            }
        }

        let running = self.tasks.join(self.config.join_timeout);
        let stats = self.stats.snapshot();
        tracing::info!(
            frames_sent = stats.frames_sent,
            frames_received = stats.frames_received,
            chunks_dropped = stats.chunks_dropped,
            decode_errors = stats.decode_errors,
            "bridge closed"
        );

        terminated?;
        if running > 0 {
            tracing::warn!(running, "background tasks still running after close");
            return Err(BridgeError::ShutdownIncomplete { running });
        }
        Ok(())
    }

    /// Human-readable description of the bridge.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_fired()
    }
}

impl Read for &Bridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Bridge::read(*self, buf) {
            Ok(n) => Ok(n),
            Err(err) if err.is_end_of_stream() => Ok(0),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modifying traffic using '{}' command", self.command)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("command", &self.command.as_str())
            .field("closed", &self.is_closed())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "bridge did not shut down cleanly");
        }
    }
}
