//! Shared pipeline timing state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Sentinel for "nothing recorded yet".
pub(crate) const UNSET: u64 = u64::MAX;

/// Process-wide monotonic state: when the last frame was admitted and when
/// the last autofocus pass ran.
///
/// Created before the camera manager starts, shared with the throttle gate,
/// and reset whenever a camera session is torn down so that the next session
/// admits its first frame immediately.
#[derive(Debug)]
pub struct PipelineClock {
    epoch: Instant,
    pub(crate) last_admitted_ms: AtomicU64,
    last_focus_ms: AtomicU64,
}

impl PipelineClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_admitted_ms: AtomicU64::new(UNSET),
            last_focus_ms: AtomicU64::new(UNSET),
        }
    }

    /// Milliseconds since this clock was created.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Frame timestamp of the last admitted frame, if any.
    pub fn last_admitted(&self) -> Option<u64> {
        match self.last_admitted_ms.load(Ordering::Acquire) {
            UNSET => None,
            ts => Some(ts),
        }
    }

    pub fn record_focus(&self) {
        self.last_focus_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Clock time (see `now_ms`) of the last autofocus pass, if any.
    pub fn last_focus(&self) -> Option<u64> {
        match self.last_focus_ms.load(Ordering::Acquire) {
            UNSET => None,
            ts => Some(ts),
        }
    }

    pub fn reset(&self) {
        self.last_admitted_ms.store(UNSET, Ordering::Release);
        self.last_focus_ms.store(UNSET, Ordering::Release);
    }
}

impl Default for PipelineClock {
    fn default() -> Self {
        Self::new()
    }
}
