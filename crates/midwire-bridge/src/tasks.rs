use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{BridgeError, Result};

/// Tracks the background threads of one bridge so `close` can join them.
///
/// Every task holds a clone of `alive`; nothing is ever sent on it. Once the
/// set is sealed and every task has returned, `done` disconnects.
pub(crate) struct TaskSet {
    alive: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskSet {
    pub(crate) fn new() -> Self {
        let (alive, done) = bounded(0);
        Self {
            alive: Mutex::new(Some(alive)),
            done,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start a named thread. Fails once the set has been sealed by `join`.
    pub(crate) fn spawn<F>(&self, name: String, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        // Held until the handle is recorded, so `join` never misses it.
        let alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        let token = alive.clone().ok_or(BridgeError::Stopped)?;

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _token = token;
                task();
            })
            .map_err(|source| BridgeError::Spawn { task: name, source })?;

        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        drop(alive);
        Ok(())
    }

    /// Seal the set and wait up to `timeout` for every task to return.
    ///
    /// Returns how many tasks were still running at the deadline. Those are
    /// detached, not killed.
    pub(crate) fn join(&self, timeout: Duration) -> usize {
        drop(
            self.alive
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let deadline = Instant::now() + timeout;
        let all_done = matches!(
            self.done.recv_deadline(deadline),
            Err(RecvTimeoutError::Disconnected)
        );

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let mut running = 0usize;
        for handle in handles {
            if !all_done && !handle.is_finished() {
                running += 1;
                continue;
            }
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                tracing::error!(task = %name, "background task panicked");
            }
        }
        running
    }
}
