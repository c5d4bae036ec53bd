use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;

use crate::frame::NormalizedImage;
use crate::recognize::backend::RecognitionBackend;

/// Scripted backend for testing and headless runs.
///
/// Answers each request with the next entry of its script, wrapping around.
/// An empty script answers every request with an empty string.
pub struct ScriptedRecognizer {
    script: Vec<String>,
    latency: Duration,
    cursor: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            latency: Duration::ZERO,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Simulate service latency on every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Requests answered so far.
    pub fn requests(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl RecognitionBackend for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<String> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        log::debug!(
            "scripted recognizer: request #{} on {}x{} image",
            index + 1,
            image.width(),
            image.height()
        );
        if self.script.is_empty() {
            return Ok(String::new());
        }
        Ok(self.script[index % self.script.len()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn cycles_through_script() -> Result<()> {
        let backend = ScriptedRecognizer::new(["one", "two"]);
        let image = NormalizedImage::new(RgbImage::new(2, 2));
        let answers: Vec<String> = (0..3)
            .map(|_| backend.recognize(&image))
            .collect::<Result<_>>()?;
        assert_eq!(answers, vec!["one", "two", "one"]);
        assert_eq!(backend.requests(), 3);
        Ok(())
    }

    #[test]
    fn empty_script_answers_nothing() -> Result<()> {
        let backend = ScriptedRecognizer::default();
        let image = NormalizedImage::new(RgbImage::new(2, 2));
        assert_eq!(backend.recognize(&image)?, "");
        Ok(())
    }
}
