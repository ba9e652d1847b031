//! Self-timer: counts down once per second, then fires.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Seconds left before the shot.
    Tick(u32),
    /// Take the photo now.
    Fire,
}

/// A running countdown. Dropping it cancels the timer.
#[derive(Debug)]
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Start counting down from `seconds` on `runtime`.
    ///
    /// `notify` receives `Tick(seconds)`, `Tick(seconds - 1)`, ... `Tick(1)`
    /// one second apart, then `Fire` one second after the last tick.
    pub fn start<F>(runtime: &Handle, seconds: u32, notify: F) -> Self
    where
        F: Fn(CountdownEvent) + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            for remaining in (1..=seconds).rev() {
                notify(CountdownEvent::Tick(remaining));
                ticker.tick().await;
            }
            notify(CountdownEvent::Fire);
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
