use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use midwire_bridge::{Bridge, BridgeConfig, BridgeError};
use midwire_process::ShutdownGrace;

use crate::cmd::{parse_duration, require_positive, RunArgs};
use crate::exit::{bridge_error, io_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS};
use crate::output::OutputFormat;

/// Slack on top of the configured grace periods when waiting for an
/// interrupt-triggered close.
const INTERRUPT_SLACK: Duration = Duration::from_secs(5);

pub fn run(args: RunArgs, _format: OutputFormat) -> CliResult<i32> {
    let grace = parse_duration(&args.shutdown_grace)?;
    let join_timeout = parse_duration(&args.join_timeout)?;
    let config = BridgeConfig::default()
        .with_max_payload(require_positive("--max-payload", args.max_payload)?)
        .with_queue_capacity(require_positive("--queue-capacity", args.queue_capacity)?)
        .with_shutdown_grace(ShutdownGrace::uniform(grace))
        .with_join_timeout(join_timeout);

    let bridge = Arc::new(
        Bridge::spawn_with_config(&args.command, config)
            .map_err(|err| bridge_error("failed to start middleware", err))?,
    );
    tracing::info!("{bridge}");
    let (closed_tx, closed_rx) = bounded(1);
    install_ctrlc_handler(Arc::clone(&bridge), closed_tx)?;

    let (eof_tx, eof_rx) = bounded(0);
    bridge
        .attach(EndNotifier::new(io::stdin(), eof_tx))
        .map_err(|err| bridge_error("attach failed", err))?;
    spawn_input_closer(Arc::clone(&bridge), eof_rx)?;

    let mut stdout = io::stdout().lock();
    loop {
        match bridge.recv() {
            Ok(payload) => {
                stdout
                    .write_all(&payload)
                    .and_then(|()| stdout.flush())
                    .map_err(|err| io_error("write failed", err))?;
            }
            Err(err) if err.is_stopped() => {
                let budget = grace * 2 + join_timeout + INTERRUPT_SLACK;
                if closed_rx.recv_timeout(budget).is_err() {
                    tracing::warn!("interrupt handler did not finish closing the bridge");
                }
                return Ok(INTERRUPTED);
            }
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(bridge_error("receive failed", err)),
        }
    }

    match bridge.close() {
        Ok(()) => {}
        // Host stdin may still be blocked in a read; the process exit releases it.
        Err(BridgeError::ShutdownIncomplete { running }) => {
            tracing::debug!(running, "leaving blocked input reader behind");
        }
        Err(err) => return Err(bridge_error("shutdown failed", err)),
    }

    let stats = bridge.stats();
    tracing::info!(
        frames_sent = stats.frames_sent,
        bytes_sent = stats.bytes_sent,
        frames_received = stats.frames_received,
        bytes_received = stats.bytes_received,
        chunks_dropped = stats.chunks_dropped,
        decode_errors = stats.decode_errors,
        "bridge finished"
    );
    Ok(SUCCESS)
}

/// Wraps a source and disconnects `eof` once the source is exhausted.
struct EndNotifier<R> {
    inner: R,
    eof: Option<Sender<()>>,
}

impl<R> EndNotifier<R> {
    fn new(inner: R, eof: Sender<()>) -> Self {
        Self {
            inner,
            eof: Some(eof),
        }
    }
}

impl<R: Read> Read for EndNotifier<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        match &result {
            Ok(0) => drop(self.eof.take()),
            Err(err) if err.kind() != io::ErrorKind::Interrupted => drop(self.eof.take()),
            _ => {}
        }
        result
    }
}

impl<R> Drop for EndNotifier<R> {
    fn drop(&mut self) {
        drop(self.eof.take());
    }
}

/// Half-close the middleware's input once host stdin is exhausted, so the
/// middleware can flush and exit on its own.
fn spawn_input_closer(bridge: Arc<Bridge>, eof: Receiver<()>) -> CliResult<()> {
    std::thread::Builder::new()
        .name("midwire-stdin-eof".to_string())
        .spawn(move || {
            let _ = eof.recv();
            if !bridge.is_closed() {
                bridge.close_input();
            }
        })
        .map(|_| ())
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start input closer: {err}")))
}

/// Close the bridge on Ctrl-C and report on `closed` once that is done.
fn install_ctrlc_handler(bridge: Arc<Bridge>, closed: Sender<()>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupted, closing bridge");
        if let Err(err) = bridge.close() {
            tracing::warn!(error = %err, "bridge did not shut down cleanly");
        }
        let _ = closed.try_send(());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
