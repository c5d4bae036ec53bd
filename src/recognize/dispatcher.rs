use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use super::backend::RecognitionBackend;
use super::result::RecognitionResult;
use crate::frame::NormalizedImage;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend calls allowed to run at once, including calls whose request has
/// already timed out.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Identifier of one submitted request, unique per dispatcher.
pub type RequestId = u64;

/// Submits normalized images to a recognition backend without blocking.
///
/// Every request runs on its own worker thread. The image moves into that
/// worker and is dropped there when the backend call returns, whether the
/// request succeeded, failed or already timed out. Settlement callbacks fire
/// in completion order, which is not necessarily submission order.
///
/// A timed-out request settles at its deadline, but its worker keeps the
/// image until the backend returns. Live workers are therefore capped: while
/// `max_workers` backend calls are running, new submissions are refused and
/// their images dropped on the spot.
pub struct RecognitionDispatcher {
    backend: Arc<dyn RecognitionBackend>,
    timeout: Duration,
    max_workers: usize,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    workers: Arc<AtomicUsize>,
}

impl RecognitionDispatcher {
    pub fn new(backend: Arc<dyn RecognitionBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            max_workers: DEFAULT_MAX_WORKERS,
            next_id: AtomicU64::new(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
            workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the live worker cap. Clamped to at least one.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Requests submitted but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Backend calls still running, each holding one image. Exceeds
    /// `in_flight` while timed-out calls are draining.
    pub fn live_workers(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }

    /// Submit an image. `on_settled` runs exactly once on a dispatcher thread
    /// with the request's outcome.
    ///
    /// Fails when the worker cap is reached or no thread could be spawned;
    /// the image is released in both cases and `on_settled` never runs.
    pub fn submit<F>(&self, image: NormalizedImage, on_settled: F) -> Result<RequestId>
    where
        F: FnOnce(RequestId, RecognitionResult) + Send + 'static,
    {
        let Some(slot) = WorkerSlot::reserve(&self.workers, self.max_workers) else {
            drop(image);
            bail!(
                "{} recognition workers still busy; request dropped",
                self.max_workers
            );
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let backend = self.backend.clone();
        let timeout = self.timeout;
        let in_flight = self.in_flight.clone();

        in_flight.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("recognize-{}", id))
            .spawn(move || {
                let result = run_request(id, backend, image, slot, timeout);
                on_settled(id, result);
                in_flight.fetch_sub(1, Ordering::AcqRel);
            });

        if let Err(err) = spawned {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Err(err).context("spawn recognition request thread");
        }
        Ok(id)
    }
}

/// One reserved backend worker. Released when dropped.
struct WorkerSlot {
    workers: Arc<AtomicUsize>,
}

impl WorkerSlot {
    fn reserve(workers: &Arc<AtomicUsize>, max_workers: usize) -> Option<Self> {
        workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < max_workers).then_some(live + 1)
            })
            .ok()?;
        Some(Self {
            workers: workers.clone(),
        })
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.workers.fetch_sub(1, Ordering::AcqRel);
    }
}

fn run_request(
    id: RequestId,
    backend: Arc<dyn RecognitionBackend>,
    image: NormalizedImage,
    slot: WorkerSlot,
    timeout: Duration,
) -> RecognitionResult {
    let (tx, rx) = mpsc::sync_channel(1);
    let worker = thread::Builder::new()
        .name(format!("recognize-{}-worker", id))
        .spawn(move || {
            let outcome = backend.recognize(&image);
            drop(image);
            drop(slot);
            // The receiver is gone once the request timed out.
            let _ = tx.send(outcome);
        });
    if let Err(err) = worker {
        return RecognitionResult::Failed(format!("spawn recognition worker: {}", err));
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(text)) => RecognitionResult::Recognized(text),
        Ok(Err(err)) => RecognitionResult::Failed(format!("{:#}", err)),
        Err(RecvTimeoutError::Timeout) => RecognitionResult::TimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            RecognitionResult::Failed("recognition worker exited without a result".to_string())
        }
    }
}
