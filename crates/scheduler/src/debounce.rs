//! Quiet-window bookkeeping for the debounce driver
//!
//! Policy: the first event of a burst opens a window of the quiet period.
//! Every further event pushes the deadline out again, but never past the
//! burst's first event plus the staleness period, so a namespace that never
//! goes quiet still gets snapshotted once the cap is reached.

use std::time::Duration;

use tokio::time::Instant;

pub(crate) struct QuietWindow {
    deadline: Instant,
    cap: Instant,
}

impl QuietWindow {
    /// Open a window for a burst whose first event arrived at `now`
    pub(crate) fn open(now: Instant, quiet: Duration, cap_after: Duration) -> Self {
        let cap = now + cap_after;
        Self {
            deadline: (now + quiet).min(cap),
            cap,
        }
    }

    /// A further event arrived; push the deadline, bounded by the cap
    pub(crate) fn extend(&mut self, now: Instant, quiet: Duration) {
        self.deadline = (now + quiet).min(self.cap);
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }
}
