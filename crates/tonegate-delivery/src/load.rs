//! Advisory load counter.
//!
//! Tracks recent stream starts inside a sliding window. The count only
//! chooses the delivery mode; it never denies service, so a counter
//! reset (process restart) costs nothing but a briefly wrong mode.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// How long a stream start counts toward the load figure.
pub const DEFAULT_LOAD_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window counter of stream starts.
#[derive(Debug)]
pub struct LoadCounter {
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl Default for LoadCounter {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_WINDOW)
    }
}

impl LoadCounter {
    /// Creates a counter with the given sliding window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.starts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a stream start and returns the count within the window,
    /// including this one.
    pub fn record_start(&self) -> usize {
        self.record_start_at(Instant::now())
    }

    /// Records a start at an explicit instant (test seam).
    pub fn record_start_at(&self, now: Instant) -> usize {
        let mut starts = self.lock();
        Self::prune(&mut starts, self.window, now);
        starts.push_back(now);
        starts.len()
    }

    /// Current count within the window.
    pub fn current(&self) -> usize {
        self.current_at(Instant::now())
    }

    /// Count at an explicit instant (test seam).
    pub fn current_at(&self, now: Instant) -> usize {
        let mut starts = self.lock();
        Self::prune(&mut starts, self.window, now);
        starts.len()
    }

    fn prune(starts: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(front) = starts.front() {
            if now.duration_since(*front) >= window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }
}
