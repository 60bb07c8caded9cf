//! Cooperative countdown for timed quizzes.
//!
//! One tick per second; the expiry notification fires once, and cancelling
//! (on an early submit) drops the task so a late auto-submit can never fire
//! grading a second time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct CountdownTimer {
    remaining: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start counting down from `seconds`. The returned receiver resolves
    /// exactly once, when time runs out; it errors instead if the timer was
    /// cancelled first.
    pub fn start(seconds: u64) -> (Self, oneshot::Receiver<()>) {
        let remaining = Arc::new(AtomicU64::new(seconds));
        let (tx, rx) = oneshot::channel();
        let counter = remaining.clone();
        let handle = tokio::spawn(async move {
            if counter.load(Ordering::SeqCst) == 0 {
                let _ = tx.send(());
                return;
            }
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let before = counter.fetch_sub(1, Ordering::SeqCst);
                if before <= 1 {
                    let _ = tx.send(());
                    return;
                }
            }
        });
        (Self { remaining, handle }, rx)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Stop the countdown; the expiry notification will never fire.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
