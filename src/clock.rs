//! Shared clock.
//!
//! All time windows (voting, timelock, execution, freeze) are compared against
//! one clock per deployment. Expiry is observed lazily on the next call; there
//! is no background sweep.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock shared between authorities in tests and simulations.
///
/// Clones share the same underlying time. The clock never moves backwards:
/// `set` to an earlier time is ignored.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move the clock to `at` (no-op if `at` is in the past).
    pub fn set(&self, at: Timestamp) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }

    /// Advance by `secs` and return the new time.
    pub fn advance(&self, secs: u64) -> Timestamp {
        let prev = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(secs))
            })
            .unwrap_or_else(|t| t);
        prev.saturating_add(secs)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared handle used by every authority.
pub type SharedClock = Arc<dyn Clock>;
