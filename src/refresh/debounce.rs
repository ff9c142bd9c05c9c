//! Debounce Primitive
//!
//! A resettable delayed trigger: `settled` resolves once a quiet period of
//! `window` follows the most recent `poke`.

use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    signal: Notify,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            signal: Notify::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts the timer, or restarts it if already running.
    ///
    /// A poke with no waiter is remembered, so pokes made while the owner is
    /// busy start the next window.
    pub fn poke(&self) {
        self.signal.notify_one();
    }

    /// Waits for a poke, then until `window` elapses without another one.
    pub async fn settled(&self) {
        self.signal.notified().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.window) => return,
                _ = self.signal.notified() => {}
            }
        }
    }
}
