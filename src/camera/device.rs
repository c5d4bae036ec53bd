use std::sync::Arc;

use anyhow::Result;

use crate::frame::{FrameSink, PixelFormat};

/// Focus modes a sensor may advertise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusMode {
    ContinuousPicture,
    ContinuousVideo,
    Auto,
    Macro,
    Fixed,
    Infinity,
}

/// Preview resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn covers(self, minimum: Size) -> bool {
        self.width >= minimum.width && self.height >= minimum.height
    }
}

/// What an opened sensor supports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraCapabilities {
    pub focus_modes: Vec<FocusMode>,
    pub preview_sizes: Vec<Size>,
}

/// Settings applied to an opened sensor before streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewParams {
    /// `None` leaves the sensor's current focus mode untouched.
    pub focus_mode: Option<FocusMode>,
    pub size: Size,
    pub format: PixelFormat,
}

/// Geometry of the host surface the preview is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceGeometry {
    pub width: u32,
    pub height: u32,
}

/// Optical sensor driver.
///
/// The lifecycle manager is the only caller. Frames are pushed to the sink
/// from the driver's own delivery thread between `start_preview` and
/// `stop_preview`; the driver never holds the sink after `stop_preview`
/// returns.
pub trait CameraDevice: Send {
    /// Device identifier (e.g. "stub://camera").
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<()>;

    fn capabilities(&self) -> Result<CameraCapabilities>;

    fn configure(&mut self, params: &PreviewParams) -> Result<()>;

    fn bind_surface(&mut self, surface: SurfaceGeometry) -> Result<()>;

    fn start_preview(&mut self, sink: Arc<dyn FrameSink>) -> Result<()>;

    fn stop_preview(&mut self) -> Result<()>;

    /// Run one focus pass. Returns whether focus was achieved.
    fn auto_focus(&mut self) -> Result<bool>;

    fn release(&mut self) -> Result<()>;
}

/// Prefer continuous-picture focus, then single-shot auto focus, else leave
/// the focus mode alone.
pub fn select_focus_mode(supported: &[FocusMode]) -> Option<FocusMode> {
    [FocusMode::ContinuousPicture, FocusMode::Auto]
        .into_iter()
        .find(|mode| supported.contains(mode))
}

/// Largest size covering `minimum`, else the largest size overall.
pub fn select_preview_size(sizes: &[Size], minimum: Size) -> Option<Size> {
    sizes
        .iter()
        .copied()
        .filter(|size| size.covers(minimum))
        .max_by_key(|size| size.area())
        .or_else(|| sizes.iter().copied().max_by_key(|size| size.area()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: Size = Size::new(1280, 720);

    #[test]
    fn prefers_continuous_picture_focus() {
        let modes = [FocusMode::Auto, FocusMode::ContinuousPicture];
        assert_eq!(select_focus_mode(&modes), Some(FocusMode::ContinuousPicture));
    }

    #[test]
    fn falls_back_to_auto_focus() {
        let modes = [FocusMode::Fixed, FocusMode::Auto];
        assert_eq!(select_focus_mode(&modes), Some(FocusMode::Auto));
    }

    #[test]
    fn leaves_focus_alone_without_candidates() {
        assert_eq!(select_focus_mode(&[FocusMode::Fixed]), None);
        assert_eq!(select_focus_mode(&[]), None);
    }

    #[test]
    fn picks_largest_size_meeting_minimum() {
        let sizes = [
            Size::new(640, 480),
            Size::new(1280, 720),
            Size::new(1920, 1080),
            Size::new(1280, 960),
        ];
        assert_eq!(select_preview_size(&sizes, HD), Some(Size::new(1920, 1080)));
    }

    #[test]
    fn falls_back_to_largest_available() {
        let sizes = [Size::new(640, 480), Size::new(800, 600), Size::new(1024, 576)];
        assert_eq!(select_preview_size(&sizes, HD), Some(Size::new(1024, 576)));
    }

    #[test]
    fn no_sizes_means_no_selection() {
        assert_eq!(select_preview_size(&[], HD), None);
    }
}
