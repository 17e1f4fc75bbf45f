//! Cooperative cancellation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// Longest uninterrupted sleep inside [`StopToken::wait`].
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Shared stop flag checked by a worker once per tick.
///
/// Signal handlers only set the flag (see [`StopToken::flag`]); they never
/// touch worker state.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the worker to stop.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The raw flag, for registration with an OS signal handler.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Sleep for up to `timeout`, returning early once stopped. Returns
    /// whether a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn wait_times_out_without_stop() {
        let token = StopToken::new();
        let start = Instant::now();
        assert!(!token.wait(Duration::from_millis(60)));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[rstest]
    fn wait_returns_early_once_stopped() {
        let token = StopToken::new();
        let remote = token.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.stop();
        });
        let start = Instant::now();
        assert!(token.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
        stopper.join().expect("join stopper");
    }

    #[rstest]
    fn flag_is_shared() {
        let token = StopToken::new();
        token.flag().store(true, Ordering::SeqCst);
        assert!(token.is_stopped());
    }
}
