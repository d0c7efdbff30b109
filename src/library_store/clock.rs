use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanosecond wall clock that never hands out the same value twice.
///
/// Stamps stay strictly increasing even within the same nanosecond or when
/// the wall clock steps backwards.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

pub fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> i64 {
        let wall = wall_clock_nanos();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        wall.max(previous + 1)
    }

    /// Makes sure later stamps are above `ts`, used when reopening a database
    /// whose newest stamp may be ahead of the local wall clock.
    pub fn observe(&self, ts: i64) {
        self.last.fetch_max(ts, Ordering::SeqCst);
    }
}
