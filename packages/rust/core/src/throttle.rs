//! Submission throttling for concurrent tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Leaky-bucket spacing of task submissions.
///
/// Consecutive submissions are at least `interval` apart; the first one goes
/// out immediately. Only dispatch is paced: in-flight tasks are not counted,
/// so a slow task never delays the next submission beyond the interval.
#[derive(Debug)]
pub struct SubmissionThrottle {
    interval: Duration,
    next_slot: Option<Instant>,
    submitted: usize,
}

impl SubmissionThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: None,
            submitted: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of tasks submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Wait until the next submission slot opens and claim it.
    pub async fn ready(&mut self) {
        let now = Instant::now();
        let slot = match self.next_slot {
            Some(next) if next > now => {
                sleep_until(next).await;
                next
            }
            _ => now,
        };
        self.next_slot = Some(slot + self.interval);
    }

    /// Wait for a slot, then spawn `task` onto the runtime.
    pub async fn submit<F>(&mut self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.ready().await;
        self.submitted += 1;
        tokio::spawn(task)
    }
}
