use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::content::{
    inject_text, ContentSurface, FieldMatcher, InjectOutcome, SearchOrTextInput,
    SCROLLBAR_SUPPRESSION_CSS,
};
use super::display::StatusDisplay;
use crate::sanitize::SanitizedText;

pub const DEFAULT_CLEAR_AFTER: Duration = Duration::from_secs(2);

/// Messages accepted by the surface thread.
#[derive(Debug)]
pub enum SurfaceCommand {
    /// Show the text, inject it into the content surface and re-arm the clear timer.
    Deliver(SanitizedText),
    /// Content finished loading; apply the one-time style directive.
    ContentLoaded,
    Shutdown,
}

/// Sending side of the surface thread's queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SurfaceHandle {
    tx: Sender<SurfaceCommand>,
}

impl SurfaceHandle {
    /// Queue sanitized text for display and injection. Never blocks.
    pub fn deliver(&self, text: SanitizedText) -> Result<()> {
        self.send(SurfaceCommand::Deliver(text))
    }

    pub fn content_loaded(&self) -> Result<()> {
        self.send(SurfaceCommand::ContentLoaded)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SurfaceCommand::Shutdown)
    }

    fn send(&self, command: SurfaceCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("surface thread has stopped"))
    }
}

// ----------------------------------------------------------------------------
// ExpiryTimer
// ----------------------------------------------------------------------------

/// Single pending "clear the display" deadline.
///
/// Arming replaces any earlier deadline, so only the latest delivery counts.
#[derive(Clone, Debug)]
pub struct ExpiryTimer {
    clear_after: Duration,
    deadline: Option<Instant>,
}

impl ExpiryTimer {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            clear_after,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.clear_after);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, zero once it passed, `None` when disarmed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Returns true once when the deadline has passed, then disarms.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// SurfaceLoop
// ----------------------------------------------------------------------------

/// Counters reported by the surface thread when it stops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub delivered: u64,
    pub submitted: u64,
    pub cleared: u64,
}

/// Owner of the display and content surface. Runs on its own thread.
pub struct SurfaceLoop {
    display: Box<dyn StatusDisplay>,
    content: Box<dyn ContentSurface>,
    matcher: Box<dyn FieldMatcher>,
    timer: ExpiryTimer,
    style_applied: bool,
    stats: SurfaceStats,
}

impl SurfaceLoop {
    pub fn new<D, C>(display: D, content: C, clear_after: Duration) -> Self
    where
        D: StatusDisplay + 'static,
        C: ContentSurface + 'static,
    {
        Self {
            display: Box::new(display),
            content: Box::new(content),
            matcher: Box::new(SearchOrTextInput),
            timer: ExpiryTimer::new(clear_after),
            style_applied: false,
            stats: SurfaceStats::default(),
        }
    }

    /// Replace the field matching strategy.
    pub fn with_matcher<M: FieldMatcher + 'static>(mut self, matcher: M) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Start the surface thread. It runs until `Shutdown` or until every
    /// handle is dropped, and returns its counters when joined.
    pub fn spawn(self) -> Result<(SurfaceHandle, JoinHandle<SurfaceStats>)> {
        let (tx, rx) = mpsc::channel();
        let join = std::thread::Builder::new()
            .name("surface".to_string())
            .spawn(move || self.run(rx))
            .context("spawn surface thread")?;
        Ok((SurfaceHandle { tx }, join))
    }

    fn run(mut self, rx: Receiver<SurfaceCommand>) -> SurfaceStats {
        loop {
            let command = match self.timer.remaining(Instant::now()) {
                Some(wait) => match rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            match command {
                None => self.expire(Instant::now()),
                Some(SurfaceCommand::Deliver(text)) => self.deliver(&text, Instant::now()),
                Some(SurfaceCommand::ContentLoaded) => self.content_loaded(),
                Some(SurfaceCommand::Shutdown) => break,
            }
        }
        log::debug!("surface thread stopped: {:?}", self.stats);
        self.stats
    }

    fn deliver(&mut self, text: &SanitizedText, now: Instant) {
        self.display.show(text.as_str());
        self.stats.delivered += 1;

        match inject_text(self.content.as_mut(), self.matcher.as_ref(), text.as_str()) {
            Ok(InjectOutcome::Submitted { .. }) => self.stats.submitted += 1,
            Ok(InjectOutcome::FilledWithoutSubmit { fields }) => {
                log::debug!("surface: filled {} field(s), no form submitted", fields)
            }
            Ok(InjectOutcome::NoMatchingField) => {
                log::debug!("surface: no matching input field for recognized text")
            }
            Err(err) => log::warn!("surface: text injection failed: {:#}", err),
        }

        self.timer.arm(now);
    }

    fn expire(&mut self, now: Instant) {
        if self.timer.fire_if_due(now) {
            self.display.show("");
            self.stats.cleared += 1;
        }
    }

    fn content_loaded(&mut self) {
        if self.style_applied {
            return;
        }
        match self.content.inject_style(SCROLLBAR_SUPPRESSION_CSS) {
            Ok(()) => self.style_applied = true,
            Err(err) => log::warn!("surface: failed to apply style directive: {:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;
    use crate::surface::display::SharedDisplay;
    use crate::surface::document::{InMemoryDocument, SharedDocument};

    fn text(raw: &str) -> SanitizedText {
        sanitize(raw).expect("non-empty text")
    }

    #[test]
    fn expiry_fires_after_clear_delay() {
        let start = Instant::now();
        let ms = |n: u64| start + Duration::from_millis(n);
        let mut timer = ExpiryTimer::new(Duration::from_millis(2_000));

        timer.arm(ms(0));
        assert!(!timer.fire_if_due(ms(1_999)));
        assert!(timer.fire_if_due(ms(2_000)));
        assert!(!timer.is_armed());
        assert!(!timer.fire_if_due(ms(2_500)));
    }

    #[test]
    fn later_delivery_supersedes_pending_clear() {
        let start = Instant::now();
        let ms = |n: u64| start + Duration::from_millis(n);
        let mut timer = ExpiryTimer::new(Duration::from_millis(2_000));

        timer.arm(ms(0));
        timer.arm(ms(1_000));
        assert!(!timer.fire_if_due(ms(2_000)));
        assert_eq!(timer.remaining(ms(2_000)), Some(Duration::from_millis(1_000)));
        assert!(timer.fire_if_due(ms(3_000)));
    }

    #[test]
    fn surface_thread_shows_injects_and_clears() -> Result<()> {
        let display = SharedDisplay::new();
        let document = SharedDocument::new(InMemoryDocument::search_page());
        let (handle, join) =
            SurfaceLoop::new(display.clone(), document.clone(), Duration::from_millis(150))
                .spawn()?;

        handle.deliver(text("Order 42"))?;
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(display.current(), "Order 42");
        assert_eq!(document.lock()?.submissions().len(), 1);

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(display.current(), "");

        handle.shutdown()?;
        let stats = join.join().expect("surface thread");
        assert_eq!(
            stats,
            SurfaceStats {
                delivered: 1,
                submitted: 1,
                cleared: 1
            }
        );
        Ok(())
    }

    #[test]
    fn surface_thread_keeps_newer_text_past_the_first_deadline() -> Result<()> {
        let display = SharedDisplay::new();
        let document = SharedDocument::new(InMemoryDocument::search_page());
        let (handle, join) =
            SurfaceLoop::new(display.clone(), document.clone(), Duration::from_millis(300))
                .spawn()?;
        let start = Instant::now();
        let sleep_until = |ms: u64| {
            let at = start + Duration::from_millis(ms);
            std::thread::sleep(at.saturating_duration_since(Instant::now()));
        };

        handle.deliver(text("first"))?;
        sleep_until(150);
        handle.deliver(text("second"))?;

        // The clear armed by "first" would have fired at 300 ms.
        sleep_until(380);
        assert_eq!(display.current(), "second");

        sleep_until(700);
        assert_eq!(display.current(), "");

        handle.shutdown()?;
        let stats = join.join().expect("surface thread");
        assert_eq!(
            stats,
            SurfaceStats {
                delivered: 2,
                submitted: 2,
                cleared: 1
            }
        );
        Ok(())
    }

    #[test]
    fn style_directive_applies_once() -> Result<()> {
        let document = SharedDocument::new(InMemoryDocument::new());
        let (handle, join) =
            SurfaceLoop::new(SharedDisplay::new(), document.clone(), DEFAULT_CLEAR_AFTER)
                .spawn()?;
        handle.content_loaded()?;
        handle.content_loaded()?;
        handle.shutdown()?;
        join.join().expect("surface thread");

        assert_eq!(
            document.lock()?.styles(),
            &[SCROLLBAR_SUPPRESSION_CSS.to_string()]
        );
        Ok(())
    }

    #[test]
    fn dropping_every_handle_stops_the_thread() -> Result<()> {
        let (handle, join) = SurfaceLoop::new(
            SharedDisplay::new(),
            InMemoryDocument::new(),
            DEFAULT_CLEAR_AFTER,
        )
        .spawn()?;
        drop(handle);
        let stats = join.join().expect("surface thread");
        assert_eq!(stats, SurfaceStats::default());
        Ok(())
    }
}
