//! Frame admission throttle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{PipelineClock, UNSET};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Admits at most one frame per interval and drops the rest.
///
/// `admit` never blocks: the last-admitted timestamp lives in the shared
/// `PipelineClock` and is advanced with a compare-exchange, so concurrent
/// callers agree on exactly one winner per interval.
#[derive(Clone, Debug)]
pub struct ThrottleGate {
    clock: Arc<PipelineClock>,
    interval_ms: u64,
}

impl ThrottleGate {
    pub fn new(clock: Arc<PipelineClock>, interval: Duration) -> Self {
        Self {
            clock,
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns true when `frame_timestamp_ms` is at least one interval past the
    /// last admitted frame, recording it as the new last admitted frame.
    ///
    /// Frames older than the last admitted one are always dropped.
    pub fn admit(&self, frame_timestamp_ms: u64) -> bool {
        let last_admitted = &self.clock.last_admitted_ms;
        let mut last = last_admitted.load(Ordering::Acquire);
        loop {
            if last != UNSET {
                if frame_timestamp_ms < last {
                    return false;
                }
                if frame_timestamp_ms - last < self.interval_ms {
                    return false;
                }
            }
            match last_admitted.compare_exchange_weak(
                last,
                frame_timestamp_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last = actual,
            }
        }
    }
}
