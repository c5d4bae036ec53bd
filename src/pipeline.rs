//! Per-frame recognition pipeline.
//!
//! ```text
//! camera delivery thread          recognition threads         surface thread
//! on_frame -> throttle -> normalize -> submit ... settle -> sanitize -> Deliver
//! ```
//!
//! The delivery thread only pays for the throttle check and, for admitted
//! frames, one normalization pass. Recognition is fire-and-forget; its result
//! is forwarded to the surface thread as a message, never applied here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::PipelineClock;
use crate::frame::{FrameSink, RawFrame};
use crate::normalize::Normalizer;
use crate::recognize::{RecognitionBackend, RecognitionDispatcher, RecognitionResult, RequestId};
use crate::sanitize::sanitize;
use crate::surface::SurfaceHandle;
use crate::throttle::ThrottleGate;

const NO_SESSION: u64 = 0;

/// Snapshot of the pipeline counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub frames_dropped: u64,
    pub frames_admitted: u64,
    pub normalize_failures: u64,
    pub requests_submitted: u64,
    pub requests_refused: u64,
    pub results_discarded: u64,
    pub texts_delivered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_seen: AtomicU64,
    frames_dropped: AtomicU64,
    frames_admitted: AtomicU64,
    normalize_failures: AtomicU64,
    requests_submitted: AtomicU64,
    requests_refused: AtomicU64,
    results_discarded: AtomicU64,
    texts_delivered: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_admitted: self.frames_admitted.load(Ordering::Relaxed),
            normalize_failures: self.normalize_failures.load(Ordering::Relaxed),
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            requests_refused: self.requests_refused.load(Ordering::Relaxed),
            results_discarded: self.results_discarded.load(Ordering::Relaxed),
            texts_delivered: self.texts_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Throttle, normalize and dispatch frames; forward sanitized text.
pub struct RecognitionPipeline {
    gate: ThrottleGate,
    normalizer: Normalizer,
    dispatcher: RecognitionDispatcher,
    surface: SurfaceHandle,
    active_session: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl RecognitionPipeline {
    pub fn new(
        clock: Arc<PipelineClock>,
        throttle_interval: Duration,
        normalizer: Normalizer,
        backend: Arc<dyn RecognitionBackend>,
        recognition_timeout: Duration,
        surface: SurfaceHandle,
    ) -> Self {
        Self {
            gate: ThrottleGate::new(clock, throttle_interval),
            normalizer,
            dispatcher: RecognitionDispatcher::new(backend, recognition_timeout),
            surface,
            active_session: Arc::new(AtomicU64::new(NO_SESSION)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Recognition requests not yet settled.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Backend calls still running, including timed-out ones.
    pub fn live_workers(&self) -> usize {
        self.dispatcher.live_workers()
    }

    pub fn backend_name(&self) -> &'static str {
        self.dispatcher.backend_name()
    }

    /// One pipeline pass. Frames outside a live session or inside the
    /// throttle interval are dropped silently.
    pub fn process_frame(&self, frame: RawFrame) {
        Counters::bump(&self.counters.frames_seen);

        let generation = self.active_session.load(Ordering::Acquire);
        if generation == NO_SESSION || !self.gate.admit(frame.timestamp_ms) {
            Counters::bump(&self.counters.frames_dropped);
            return;
        }
        Counters::bump(&self.counters.frames_admitted);

        let image = match self.normalizer.normalize(&frame) {
            Ok(image) => image,
            Err(err) => {
                Counters::bump(&self.counters.normalize_failures);
                log::warn!(
                    "pipeline: dropping frame at {} ms: {:#}",
                    frame.timestamp_ms,
                    err
                );
                return;
            }
        };
        drop(frame);

        let surface = self.surface.clone();
        let active_session = self.active_session.clone();
        let counters = self.counters.clone();
        let submitted = self.dispatcher.submit(image, move |id, result| {
            settle(id, generation, result, &active_session, &counters, &surface)
        });
        match submitted {
            Ok(id) => {
                Counters::bump(&self.counters.requests_submitted);
                log::debug!("pipeline: request {} submitted (session {})", id, generation);
            }
            Err(err) => {
                Counters::bump(&self.counters.requests_refused);
                log::warn!("pipeline: recognition not submitted: {:#}", err);
            }
        }
    }
}

fn settle(
    id: RequestId,
    generation: u64,
    result: RecognitionResult,
    active_session: &AtomicU64,
    counters: &Counters,
    surface: &SurfaceHandle,
) {
    if active_session.load(Ordering::Acquire) != generation {
        Counters::bump(&counters.results_discarded);
        log::debug!(
            "pipeline: discarding result of request {}; session {} was released",
            id,
            generation
        );
        return;
    }

    let raw = match result {
        RecognitionResult::Recognized(raw) => raw,
        RecognitionResult::Failed(err) => {
            log::warn!("pipeline: text recognition failed for request {}: {}", id, err);
            return;
        }
        RecognitionResult::TimedOut => {
            log::warn!("pipeline: text recognition timed out for request {}", id);
            return;
        }
    };

    let Some(text) = sanitize(&raw) else {
        log::debug!("pipeline: request {} produced no usable text", id);
        return;
    };
    match surface.deliver(text) {
        Ok(()) => Counters::bump(&counters.texts_delivered),
        Err(err) => log::warn!("pipeline: {:#}", err),
    }
}

impl FrameSink for RecognitionPipeline {
    fn on_frame(&self, frame: RawFrame) {
        self.process_frame(frame);
    }

    fn on_session_started(&self, generation: u64) {
        self.active_session.store(generation, Ordering::Release);
    }

    fn on_session_ended(&self, generation: u64) {
        let _ = self.active_session.compare_exchange(
            generation,
            NO_SESSION,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{NormalizedImage, PixelFormat};
    use crate::recognize::ScriptedRecognizer;
    use crate::surface::{InMemoryDocument, SharedDisplay, SharedDocument, SurfaceLoop};
    use anyhow::Result;
    use std::sync::Mutex;
    use std::time::Instant;

    struct Gated {
        release: Mutex<bool>,
        answer: &'static str,
    }

    impl RecognitionBackend for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn recognize(&self, _image: &NormalizedImage) -> anyhow::Result<String> {
            let deadline = Instant::now() + Duration::from_secs(2);
            while !*self.release.lock().unwrap() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(self.answer.to_string())
        }
    }

    fn frame(timestamp_ms: u64) -> RawFrame {
        let len = PixelFormat::Nv21.frame_len(32, 16).unwrap();
        RawFrame::new(vec![128u8; len], 32, 16, PixelFormat::Nv21, timestamp_ms)
    }

    fn wait_for<F: Fn() -> bool>(check: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    fn pipeline_with(
        backend: Arc<dyn RecognitionBackend>,
    ) -> Result<(RecognitionPipeline, SharedDisplay, SharedDocument)> {
        let display = SharedDisplay::new();
        let document = SharedDocument::new(InMemoryDocument::search_page());
        let (handle, _join) =
            SurfaceLoop::new(display.clone(), document.clone(), Duration::from_secs(10)).spawn()?;
        let pipeline = RecognitionPipeline::new(
            Arc::new(PipelineClock::new()),
            Duration::from_millis(500),
            Normalizer::default(),
            backend,
            Duration::from_secs(5),
            handle,
        );
        Ok((pipeline, display, document))
    }

    #[test]
    fn frames_without_session_are_dropped() -> Result<()> {
        let (pipeline, _, _) = pipeline_with(Arc::new(ScriptedRecognizer::new(["x"])))?;
        pipeline.on_frame(frame(0));
        let stats = pipeline.stats();
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.requests_submitted, 0);
        Ok(())
    }

    #[test]
    fn throttled_frames_never_reach_the_backend() -> Result<()> {
        let backend = Arc::new(ScriptedRecognizer::new(["Hello"]));
        let (pipeline, display, _) = pipeline_with(backend.clone())?;
        pipeline.on_session_started(1);
        for ts in [0, 100, 400, 600] {
            pipeline.on_frame(frame(ts));
        }

        assert!(wait_for(|| pipeline.stats().texts_delivered == 2));
        assert_eq!(backend.requests(), 2);
        let stats = pipeline.stats();
        assert_eq!(stats.frames_admitted, 2);
        assert_eq!(stats.frames_dropped, 2);
        assert!(wait_for(|| display.current() == "Hello"));
        Ok(())
    }

    #[test]
    fn malformed_frames_are_not_submitted() -> Result<()> {
        let backend = Arc::new(ScriptedRecognizer::new(["x"]));
        let (pipeline, _, _) = pipeline_with(backend.clone())?;
        pipeline.on_session_started(1);
        pipeline.on_frame(RawFrame::new(Vec::new(), 32, 16, PixelFormat::Nv21, 0));

        let stats = pipeline.stats();
        assert_eq!(stats.normalize_failures, 1);
        assert_eq!(stats.requests_submitted, 0);
        assert_eq!(backend.requests(), 0);
        Ok(())
    }

    #[test]
    fn blank_text_never_reaches_the_surface() -> Result<()> {
        let (pipeline, display, document) =
            pipeline_with(Arc::new(ScriptedRecognizer::new(["   ", "™"])))?;
        pipeline.on_session_started(1);
        pipeline.on_frame(frame(0));
        pipeline.on_frame(frame(1_000));

        assert!(wait_for(|| pipeline.in_flight() == 0 && pipeline.stats().requests_submitted == 2));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pipeline.stats().texts_delivered, 0);
        assert_eq!(display.current(), "");
        assert!(document.lock()?.submissions().is_empty());
        Ok(())
    }

    #[test]
    fn results_of_released_sessions_are_discarded() -> Result<()> {
        let backend = Arc::new(Gated {
            release: Mutex::new(false),
            answer: "late text",
        });
        let (pipeline, display, _) = pipeline_with(backend.clone())?;
        pipeline.on_session_started(1);
        pipeline.on_frame(frame(0));
        pipeline.on_session_ended(1);
        *backend.release.lock().unwrap() = true;

        assert!(wait_for(|| pipeline.stats().results_discarded == 1));
        assert_eq!(pipeline.stats().texts_delivered, 0);
        assert_eq!(display.current(), "");
        Ok(())
    }

    #[test]
    fn busy_backend_refuses_extra_frames() -> Result<()> {
        let backend = Arc::new(Gated {
            release: Mutex::new(false),
            answer: "slow",
        });
        let (pipeline, _, _) = pipeline_with(backend.clone())?;
        pipeline.on_session_started(1);
        for i in 0..6u64 {
            pipeline.on_frame(frame(i * 1_000));
        }

        let stats = pipeline.stats();
        assert_eq!(stats.requests_submitted, 4);
        assert_eq!(stats.requests_refused, 2);
        assert_eq!(pipeline.live_workers(), 4);

        *backend.release.lock().unwrap() = true;
        assert!(wait_for(|| pipeline.live_workers() == 0));
        assert!(wait_for(|| pipeline.stats().texts_delivered == 4));
        Ok(())
    }

    #[test]
    fn ending_a_stale_session_keeps_the_current_one() {
        let display = SharedDisplay::new();
        let (handle, _join) = SurfaceLoop::new(
            display,
            InMemoryDocument::new(),
            Duration::from_secs(1),
        )
        .spawn()
        .unwrap();
        let pipeline = RecognitionPipeline::new(
            Arc::new(PipelineClock::new()),
            Duration::from_millis(500),
            Normalizer::default(),
            Arc::new(ScriptedRecognizer::default()),
            Duration::from_secs(1),
            handle,
        );
        pipeline.on_session_started(2);
        pipeline.on_session_ended(1);
        assert_eq!(pipeline.active_session.load(Ordering::Acquire), 2);
    }
}
