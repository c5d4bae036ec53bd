use anyhow::Result;

use crate::frame::NormalizedImage;

/// Recognition backend trait.
///
/// `recognize` is a blocking call; the dispatcher gives every request its own
/// worker thread, so implementations may be slow but must be shareable across
/// threads. The image is borrowed for the duration of the call only.
pub trait RecognitionBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Recognize the text in an upright still image.
    ///
    /// An image without text yields an empty string, not an error.
    fn recognize(&self, image: &NormalizedImage) -> Result<String>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Release backend resources once no more requests will be submitted.
    /// Calls still running on timed-out workers may outlive it.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Plain;

    impl RecognitionBackend for Plain {
        fn name(&self) -> &'static str {
            "plain"
        }

        fn recognize(&self, _image: &NormalizedImage) -> Result<String> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct Closing {
        closed: AtomicBool,
    }

    impl RecognitionBackend for Closing {
        fn name(&self) -> &'static str {
            "closing"
        }

        fn recognize(&self, _image: &NormalizedImage) -> Result<String> {
            Ok(String::new())
        }

        fn shutdown(&self) -> Result<()> {
            if self.closed.swap(true, Ordering::SeqCst) {
                anyhow::bail!("already shut down");
            }
            Ok(())
        }
    }

    #[test]
    fn default_hooks_succeed() -> Result<()> {
        let backend: Arc<dyn RecognitionBackend> = Arc::new(Plain);
        backend.warm_up()?;
        backend.shutdown()?;
        Ok(())
    }

    #[test]
    fn shutdown_reaches_the_shared_backend() -> Result<()> {
        let closing = Arc::new(Closing::default());
        let backend: Arc<dyn RecognitionBackend> = closing.clone();
        backend.shutdown()?;
        assert!(closing.closed.load(Ordering::SeqCst));
        assert!(backend.shutdown().is_err());
        Ok(())
    }
}
