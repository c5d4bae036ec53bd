//! Live camera text recognition.
//!
//! This crate turns a camera preview stream into sanitized text delivered to a
//! host surface.
//!
//! # Architecture
//!
//! Frames flow one way:
//!
//! 1. **Camera**: the lifecycle manager acquires the sensor once a surface and
//!    the camera capability exist, configures preview, and keeps focus fresh.
//! 2. **Throttle**: at most one frame per interval is admitted; the rest are
//!    dropped on the delivery thread.
//! 3. **Normalize**: admitted frames become upright RGB still images.
//! 4. **Recognize**: images go to a pluggable backend, asynchronously, with a
//!    deadline.
//! 5. **Sanitize**: recognized text is reduced to an allowlisted alphabet.
//! 6. **Surface**: non-empty text is shown, injected into the content surface,
//!    and cleared after a fixed delay.
//!
//! # Module Structure
//!
//! - `frame`: RawFrame, NormalizedImage, FrameSink
//! - `camera`: CameraDevice, CameraManager, synthetic `stub://` camera, autofocus
//! - `throttle`, `clock`: admission gate over the shared pipeline clock
//! - `normalize`: color conversion, JPEG round trip, rotation
//! - `recognize`: backends, registry, dispatcher
//! - `sanitize`: character allowlist
//! - `surface`: display, content injection, expiry timer
//! - `pipeline`: wiring from frame delivery to surface commands
//! - `config`: file and environment configuration

pub mod camera;
pub mod clock;
pub mod config;
pub mod frame;
pub mod normalize;
pub mod pipeline;
pub mod recognize;
pub mod sanitize;
pub mod surface;
pub mod throttle;

pub use camera::{CameraDevice, CameraManager, CameraState};
pub use clock::PipelineClock;
pub use config::TextcamConfig;
pub use frame::{FrameSink, NormalizedImage, PixelFormat, RawFrame};
pub use normalize::{Normalizer, Rotation};
pub use pipeline::{PipelineStats, RecognitionPipeline};
pub use recognize::{RecognitionBackend, RecognitionResult, RecognizerRegistry};
pub use sanitize::{sanitize, SanitizedText};
pub use surface::{SurfaceHandle, SurfaceLoop};
pub use throttle::ThrottleGate;
