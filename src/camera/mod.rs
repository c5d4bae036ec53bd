//! Camera resource: the driver seam, capability gate, synthetic device,
//! autofocus cycle and the session lifecycle manager.
//!
//! The manager supervises the device out of band. It never touches frames;
//! those flow from the device's delivery thread straight into a `FrameSink`.

mod autofocus;
mod capability;
mod device;
mod lifecycle;
pub mod synthetic;

pub use autofocus::{AutofocusCycle, DEFAULT_FOCUS_INITIAL_DELAY, DEFAULT_FOCUS_INTERVAL};
pub use capability::{CapabilityGate, FixedCapabilityGate};
pub use device::{
    select_focus_mode, select_preview_size, CameraCapabilities, CameraDevice, FocusMode,
    PreviewParams, Size, SurfaceGeometry,
};
pub use lifecycle::{CameraManager, CameraSettings, CameraState, DEFAULT_MIN_PREVIEW};
pub use synthetic::{SyntheticCamera, SyntheticCameraConfig};
