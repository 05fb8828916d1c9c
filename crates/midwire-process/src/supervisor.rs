use std::process::{Child, ChildStdin, ChildStdout, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::command::CommandLine;
use crate::error::{ProcessError, Result};
use crate::lifecycle::{ExitOutcome, ExitPolicy, ShutdownGrace, FATAL_EXIT_CODE};

/// How long to wait for the OS to reap the process after SIGKILL.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running middleware process.
///
/// stdin and stdout are piped and can be taken once each; stderr is inherited
/// from the host so diagnostics reach the terminal unbuffered and unmodified.
/// A dedicated thread owns the [`Child`] and blocks on `wait()`.
pub struct MiddlewareProcess {
    command: CommandLine,
    pid: u32,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    exit_rx: Receiver<ExitOutcome>,
    outcome: Option<ExitOutcome>,
    state: Arc<WaitState>,
    waiter: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct WaitState {
    shutting_down: AtomicBool,
    exited: AtomicBool,
}

#[derive(Clone, Copy, Debug)]
enum Signal {
    Term,
    Kill,
}

impl MiddlewareProcess {
    /// Start the middleware and its wait thread.
    ///
    /// Both pipes exist before the program runs, so output produced before
    /// the caller starts reading stays buffered in the pipe.
    pub fn spawn(command: &CommandLine, policy: ExitPolicy) -> Result<Self> {
        let mut child = command
            .to_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        let state = Arc::new(WaitState::default());
        let (exit_tx, exit_rx) = bounded(1);

        let waiter = {
            let state = Arc::clone(&state);
            let command = command.clone();
            std::thread::Builder::new()
                .name(format!("midwire-wait-{pid}"))
                .spawn(move || wait_for_exit(child, command, policy, state, exit_tx))
                .map_err(ProcessError::WaitThread)?
        };

        tracing::info!(pid, command = %command, "middleware started");

        Ok(Self {
            command: command.clone(),
            pid,
            stdin,
            stdout,
            exit_rx,
            outcome: None,
            state,
            waiter: Some(waiter),
        })
    }

    /// Take ownership of the middleware's stdin pipe.
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.stdin
            .take()
            .ok_or(ProcessError::PipeUnavailable("stdin"))
    }

    /// Take ownership of the middleware's stdout pipe.
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.stdout
            .take()
            .ok_or(ProcessError::PipeUnavailable("stdout"))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// True once the wait thread has observed the process exit.
    pub fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    /// Mark every subsequent exit as expected, so it is never fatal.
    pub fn begin_shutdown(&self) {
        self.state.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Wait up to `timeout` for the process to exit.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ExitOutcome> {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }

        match self.exit_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outcome = Some(outcome.clone());
                self.reap_waiter();
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // The wait thread ended without reporting; under Terminate it may be exiting the host.
                let outcome = ExitOutcome::WaitFailed {
                    reason: "wait thread ended without an exit status".to_string(),
                };
                self.outcome = Some(outcome.clone());
                self.reap_waiter();
                Some(outcome)
            }
        }
    }

    /// Stop the middleware: close stdin, then SIGTERM, then SIGKILL.
    ///
    /// The caller should already have dropped any stdin handle it took;
    /// the process cannot see end-of-input while another copy is open.
    pub fn terminate(&mut self, grace: &ShutdownGrace) -> Result<ExitOutcome> {
        self.begin_shutdown();
        drop(self.stdin.take());

        if let Some(outcome) = self.wait_timeout(grace.stdin_close_grace) {
            tracing::debug!(pid = self.pid, %outcome, "middleware exited after stdin close");
            return Ok(outcome);
        }

        tracing::info!(pid = self.pid, "middleware still running, sending SIGTERM");
        self.send_signal(Signal::Term);
        if let Some(outcome) = self.wait_timeout(grace.sigterm_grace) {
            tracing::debug!(pid = self.pid, %outcome, "middleware exited after SIGTERM");
            return Ok(outcome);
        }

        tracing::warn!(pid = self.pid, "middleware ignored SIGTERM, sending SIGKILL");
        self.send_signal(Signal::Kill);
        self.wait_timeout(KILL_REAP_TIMEOUT)
            .ok_or(ProcessError::Unresponsive { pid: self.pid })
    }

    fn reap_waiter(&mut self) {
        if let Some(handle) = self.waiter.take() {
            if handle.join().is_err() {
                tracing::error!(pid = self.pid, "middleware wait thread panicked");
            }
        }
    }

    #[cfg(unix)]
    fn send_signal(&self, signal: Signal) {
        if self.has_exited() {
            return;
        }
        let signo = match signal {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        let Ok(pid) = libc::pid_t::try_from(self.pid) else {
            return;
        };

        // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
        // The wait thread has not reaped `pid` yet (checked above), so it still names our child.
        let rc = unsafe { libc::kill(pid, signo) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(pid = self.pid, ?signal, error = %err, "failed to signal middleware");
        }
    }

    #[cfg(not(unix))]
    fn send_signal(&self, signal: Signal) {
        tracing::warn!(
            pid = self.pid,
            ?signal,
            "signals are not supported on this platform"
        );
    }
}

impl Drop for MiddlewareProcess {
    fn drop(&mut self) {
        if self.outcome.is_none() && !self.has_exited() {
            self.begin_shutdown();
            self.send_signal(Signal::Kill);
        }
    }
}

impl std::fmt::Debug for MiddlewareProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareProcess")
            .field("command", &self.command.as_str())
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}

fn wait_for_exit(
    mut child: Child,
    command: CommandLine,
    policy: ExitPolicy,
    state: Arc<WaitState>,
    exit_tx: Sender<ExitOutcome>,
) {
    let pid = child.id();
    let outcome = match child.wait() {
        Ok(status) => ExitOutcome::from_status(status),
        Err(err) => ExitOutcome::WaitFailed {
            reason: err.to_string(),
        },
    };
    state.exited.store(true, Ordering::SeqCst);

    if state.shutting_down.load(Ordering::SeqCst) {
        tracing::debug!(pid, %outcome, "middleware stopped");
    } else if outcome.is_success() {
        tracing::info!(pid, command = %command, "middleware exited");
    } else {
        match policy {
            ExitPolicy::Terminate => {
                tracing::error!(pid, command = %command, %outcome, "middleware failed, terminating");
                eprintln!("middleware '{command}' {outcome}");
                std::process::exit(FATAL_EXIT_CODE);
            }
            ExitPolicy::Report => {
                tracing::warn!(pid, command = %command, %outcome, "middleware failed");
            }
        }
    }

    let _ = exit_tx.send(outcome);
}
