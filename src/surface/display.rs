use std::sync::{Arc, Mutex};

/// Status indicator showing the most recent recognized text.
pub trait StatusDisplay: Send {
    /// Replace the displayed text. An empty string clears the display.
    fn show(&mut self, text: &str);
}

/// Headless display that writes every change to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn show(&mut self, text: &str) {
        if text.is_empty() {
            log::info!("status cleared");
        } else {
            log::info!("status: {}", text);
        }
    }
}

/// Display whose current text can be read from other threads.
#[derive(Clone, Debug, Default)]
pub struct SharedDisplay {
    text: Arc<Mutex<String>>,
}

impl SharedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> String {
        match self.text.lock() {
            Ok(text) => text.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatusDisplay for SharedDisplay {
    fn show(&mut self, text: &str) {
        let mut guard = match self.text.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
        guard.push_str(text);
    }
}
