//! Trailing-edge debouncing of a value stream.
//!
//! The handle pushes values; [`Debouncer::next`] resolves to the latest one
//! once no new value has arrived for the configured delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Producer side, cheap to clone.
#[derive(Clone)]
pub struct DebounceHandle<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> DebounceHandle<T> {
    pub fn push(&self, value: T) {
        self.tx.send_replace(value);
    }
}

pub struct Debouncer<T> {
    rx: watch::Receiver<T>,
    delay: Duration,
    /// A change has been observed but has not settled yet.
    pending: bool,
}

impl<T: Clone> Debouncer<T> {
    /// Create a debouncer seeded with `initial`, which is not itself emitted.
    pub fn new(initial: T, delay: Duration) -> (DebounceHandle<T>, Self) {
        let (tx, rx) = watch::channel(initial);
        (DebounceHandle { tx: Arc::new(tx) }, Self { rx, delay, pending: false })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the input to settle and return the settled value.
    ///
    /// Returns `None` once every handle has been dropped and no unsettled
    /// value remains. Cancel-safe: a change observed by a dropped call is
    /// still emitted by the next one, after a fresh quiet period.
    pub async fn next(&mut self) -> Option<T> {
        if !self.pending {
            self.rx.changed().await.ok()?;
            self.pending = true;
        }
        loop {
            tokio::select! {
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.delay) => break,
            }
        }
        self.pending = false;
        Some(self.rx.borrow_and_update().clone())
    }
}
