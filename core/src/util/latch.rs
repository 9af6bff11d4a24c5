//! A countdown latch used to report block-chain-download progress back to a
//! caller: initialized to the height gap between the local and remote chain
//! tips, decremented once per connected block, awaitable with a timeout.

use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};

#[derive(Debug)]
pub struct CountdownLatch {
    count: AtomicI64,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(initial: u32) -> Self {
        CountdownLatch {
            count: AtomicI64::new(initial as i64),
            notify: Notify::new(),
        }
    }

    /// Current count; may go negative if more blocks connect than the latch
    /// was initialized for (a peer with a longer chain than first reported).
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn countdown(&self) {
        let previous = self.count.fetch_sub(1, Ordering::SeqCst);
        if previous <= 1 {
            self.notify.notify_waiters();
        }
    }

    /// Waits for the latch to reach zero or below, or for `timeout` to
    /// elapse. The deadline is computed once from a monotonic clock so that
    /// spurious wake-ups (the `Notify` may fire before `count` actually
    /// reaches zero if counts are still draining) cannot extend it: each
    /// loop iteration re-checks the count and re-derives the remaining
    /// budget from the same fixed deadline rather than resetting a fresh
    /// timeout.
    pub async fn await_zero(&self, timeout: Duration) -> bool {
        if self.count() <= 0 {
            return true;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.count() <= 0;
            }

            let notified = self.notify.notified();
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(remaining) => {}
            }

            if self.count() <= 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return self.count() <= 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reaches_zero_after_enough_countdowns() {
        let latch = CountdownLatch::new(3);
        assert_eq!(latch.count(), 3);
        latch.countdown();
        latch.countdown();
        assert!(!latch.await_zero(Duration::from_millis(10)).await);
        latch.countdown();
        assert!(latch.await_zero(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn times_out_without_reaching_zero() {
        let latch = CountdownLatch::new(5);
        let reached = latch.await_zero(Duration::from_millis(20)).await;
        assert!(!reached);
        assert_eq!(latch.count(), 5);
    }

    #[tokio::test]
    async fn zero_initial_count_returns_immediately() {
        let latch = CountdownLatch::new(0);
        assert!(latch.await_zero(Duration::from_millis(1)).await);
    }
}
