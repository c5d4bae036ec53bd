/// Outcome of one recognition request. Consumed once by the sanitizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognitionResult {
    /// Raw text as returned by the backend (possibly empty).
    Recognized(String),
    /// The backend reported an error or its worker died.
    Failed(String),
    /// No answer within the dispatcher's timeout; a late answer is dropped.
    TimedOut,
}

impl RecognitionResult {
    pub fn text(&self) -> Option<&str> {
        match self {
            RecognitionResult::Recognized(text) => Some(text),
            _ => None,
        }
    }
}
