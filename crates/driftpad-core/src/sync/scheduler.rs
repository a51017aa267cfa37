//! Debounced save scheduler
//!
//! Coalesces bursts of edits into a single remote push. Every edit re-arms
//! one timer; when it fires and the document has been quiet long enough the
//! latest content is handed back to the caller.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

use crate::config::SyncTiming;

/// Single cancellable debounce timer
#[derive(Debug)]
pub struct SaveScheduler {
    debounce: Duration,
    quiet_period: Duration,
    timer: Option<Pin<Box<Sleep>>>,
    last_change: Option<Instant>,
    pending: Option<String>,
}

impl SaveScheduler {
    pub fn new(timing: SyncTiming) -> Self {
        Self {
            debounce: timing.debounce,
            quiet_period: timing.quiet_period,
            timer: None,
            last_change: None,
            pending: None,
        }
    }

    /// Record an edit and (re)arm the timer
    ///
    /// Any previously armed timer is superseded.
    pub fn schedule(&mut self, content: String) {
        let now = Instant::now();
        self.last_change = Some(now);
        self.pending = Some(content);
        self.timer = Some(Box::pin(sleep(self.debounce)));
    }

    /// Disarm the timer and drop the pending content
    pub fn cancel(&mut self) {
        self.timer = None;
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Content waiting for the timer
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Wait for the timer to fire and return the content to push
    ///
    /// Pending forever while disarmed. If the quiet period has not elapsed
    /// when the timer fires, the timer is re-armed for the remainder.
    /// Dropping the future leaves the scheduler untouched, so it can be
    /// polled from `tokio::select!`.
    pub async fn fired(&mut self) -> String {
        loop {
            match self.timer.as_mut() {
                Some(timer) => timer.await,
                None => std::future::pending::<()>().await,
            }

            let now = Instant::now();
            let last_change = self.last_change.unwrap_or(now);
            let quiet_for = now.saturating_duration_since(last_change);

            if quiet_for < self.quiet_period {
                if let Some(timer) = self.timer.as_mut() {
                    timer.as_mut().reset(last_change + self.quiet_period);
                }
                continue;
            }

            self.timer = None;
            if let Some(content) = self.pending.take() {
                return content;
            }
        }
    }
}
