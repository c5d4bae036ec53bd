//! Text recognition: backend seam, registry and the asynchronous dispatcher.

mod backend;
mod backends;
mod dispatcher;
mod registry;
mod result;

pub use backend::RecognitionBackend;
#[cfg(feature = "recognize-http")]
pub use backends::HttpRecognizer;
pub use backends::ScriptedRecognizer;
pub use dispatcher::{RecognitionDispatcher, RequestId, DEFAULT_TIMEOUT};
pub use registry::RecognizerRegistry;
pub use result::RecognitionResult;
