use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// One-shot shutdown broadcast.
///
/// Firing drops the only sender of a never-used channel, so every clone of
/// the receiver becomes ready at once and stays ready. That makes the signal
/// usable as a `crossbeam_channel::select!` arm next to a queue operation.
/// Firing more than once is a no-op.
#[derive(Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

struct Inner {
    fired: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(trigger);
        true
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready (disconnected) once the signal fires.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.rx
    }

    /// Block until the signal fires or `timeout` elapses. Returns whether it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.inner.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        ) || self.is_fired()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use crossbeam_channel::select;

    use super::*;

    #[test]
    fn fires_once() {
        let stop = StopSignal::new();
        assert!(!stop.is_fired());
        assert!(stop.fire());
        assert!(stop.is_fired());
        assert!(!stop.fire());
        assert!(!stop.fire());
        assert!(stop.is_fired());
    }

    #[test]
    fn concurrent_fire_has_one_winner() {
        let stop = StopSignal::new();
        let winners: usize = (0..8)
            .map(|_| {
                let stop = stop.clone();
                thread::spawn(move || stop.fire())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn wakes_blocked_waiters() {
        let stop = StopSignal::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let stop = stop.clone();
                thread::spawn(move || stop.wait_timeout(Duration::from_secs(10)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        stop.fire();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wait_timeout_without_fire() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn receiver_is_selectable_after_fire() {
        let stop = StopSignal::new();
        let (_tx, rx) = bounded::<u8>(1);
        stop.fire();

        let fired = select! {
            recv(rx) -> _ => false,
            recv(stop.receiver()) -> _ => true,
        };
        assert!(fired);
    }
}
