pub mod scripted;

#[cfg(feature = "recognize-http")]
pub mod http;

pub use scripted::ScriptedRecognizer;

#[cfg(feature = "recognize-http")]
pub use http::HttpRecognizer;
