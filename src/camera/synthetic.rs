//! Synthetic camera for `stub://` devices.
//!
//! Streams NV21 frames from its own delivery thread at the configured rate,
//! the way a sensor driver calls back once per preview frame. Pixel content is
//! a moving gradient whose scene changes every 50 frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use super::device::{
    CameraCapabilities, CameraDevice, FocusMode, PreviewParams, Size, SurfaceGeometry,
};
use crate::frame::{FrameSink, PixelFormat, RawFrame};

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticCameraConfig {
    /// Device name, conventionally `stub://<name>`.
    pub device: String,
    /// Frames per second delivered while previewing.
    pub fps: u32,
    pub preview_sizes: Vec<Size>,
    pub focus_modes: Vec<FocusMode>,
}

impl Default for SyntheticCameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            fps: 30,
            preview_sizes: vec![Size::new(320, 240), Size::new(640, 480), Size::new(1280, 720)],
            focus_modes: vec![FocusMode::Fixed, FocusMode::Auto, FocusMode::ContinuousPicture],
        }
    }
}

struct Streamer {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Synthetic camera device.
pub struct SyntheticCamera {
    config: SyntheticCameraConfig,
    epoch: Instant,
    opened: bool,
    params: Option<PreviewParams>,
    surface: Option<SurfaceGeometry>,
    streamer: Option<Streamer>,
    frames_delivered: Arc<AtomicU64>,
    focus_passes: u64,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticCameraConfig) -> Result<Self> {
        if !config.device.starts_with("stub://") {
            bail!(
                "synthetic camera requires a stub:// device, got '{}'",
                config.device
            );
        }
        if config.fps == 0 {
            bail!("synthetic camera fps must be >= 1");
        }
        Ok(Self {
            config,
            epoch: Instant::now(),
            opened: false,
            params: None,
            surface: None,
            streamer: None,
            frames_delivered: Arc::new(AtomicU64::new(0)),
            focus_passes: 0,
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.streamer.is_some()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Acquire)
    }

    pub fn focus_passes(&self) -> u64 {
        self.focus_passes
    }

    pub fn surface(&self) -> Option<SurfaceGeometry> {
        self.surface
    }

    fn halt_stream(&mut self) -> Result<()> {
        if let Some(streamer) = self.streamer.take() {
            streamer.stop.store(true, Ordering::SeqCst);
            streamer
                .join
                .join()
                .map_err(|_| anyhow!("synthetic camera delivery thread panicked"))?;
        }
        Ok(())
    }
}

impl CameraDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn open(&mut self) -> Result<()> {
        if self.opened {
            bail!("{} is already open", self.config.device);
        }
        self.opened = true;
        log::info!("SyntheticCamera: opened {}", self.config.device);
        Ok(())
    }

    fn capabilities(&self) -> Result<CameraCapabilities> {
        if !self.opened {
            bail!("{} is not open", self.config.device);
        }
        Ok(CameraCapabilities {
            focus_modes: self.config.focus_modes.clone(),
            preview_sizes: self.config.preview_sizes.clone(),
        })
    }

    fn configure(&mut self, params: &PreviewParams) -> Result<()> {
        if !self.opened {
            bail!("{} is not open", self.config.device);
        }
        if !self.config.preview_sizes.contains(&params.size) {
            bail!(
                "preview size {}x{} not supported by {}",
                params.size.width,
                params.size.height,
                self.config.device
            );
        }
        if params.format != PixelFormat::Nv21 {
            bail!("{} only streams NV21", self.config.device);
        }
        self.params = Some(*params);
        Ok(())
    }

    fn bind_surface(&mut self, surface: SurfaceGeometry) -> Result<()> {
        if !self.opened {
            bail!("{} is not open", self.config.device);
        }
        self.surface = Some(surface);
        Ok(())
    }

    fn start_preview(&mut self, sink: Arc<dyn FrameSink>) -> Result<()> {
        let params = self
            .params
            .ok_or_else(|| anyhow!("{} is not configured", self.config.device))?;
        if self.surface.is_none() {
            bail!("{} has no preview surface bound", self.config.device);
        }
        if self.streamer.is_some() {
            bail!("{} is already streaming", self.config.device);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let frames = self.frames_delivered.clone();
        let epoch = self.epoch;
        let frame_interval = Duration::from_millis(1000 / self.config.fps.max(1) as u64);
        let join = std::thread::Builder::new()
            .name("synthetic-camera".to_string())
            .spawn(move || {
                let mut scene = SyntheticScene::default();
                while !stop_thread.load(Ordering::SeqCst) {
                    let data = scene.next_nv21(params.size);
                    let timestamp_ms = epoch.elapsed().as_millis() as u64;
                    sink.on_frame(RawFrame::new(
                        data,
                        params.size.width,
                        params.size.height,
                        PixelFormat::Nv21,
                        timestamp_ms,
                    ));
                    frames.fetch_add(1, Ordering::AcqRel);
                    std::thread::sleep(frame_interval);
                }
            })
            .context("spawn synthetic camera delivery thread")?;

        self.streamer = Some(Streamer { stop, join });
        log::info!(
            "SyntheticCamera: streaming {}x{} at {} fps",
            params.size.width,
            params.size.height,
            self.config.fps
        );
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        self.halt_stream()
    }

    fn auto_focus(&mut self) -> Result<bool> {
        if !self.opened {
            bail!("{} is not open", self.config.device);
        }
        self.focus_passes += 1;
        Ok(true)
    }

    fn release(&mut self) -> Result<()> {
        self.halt_stream()?;
        self.opened = false;
        self.params = None;
        self.surface = None;
        log::info!("SyntheticCamera: released {}", self.config.device);
        Ok(())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        if let Err(err) = self.halt_stream() {
            log::error!("SyntheticCamera: {:#}", err);
        }
    }
}

#[derive(Default)]
struct SyntheticScene {
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticScene {
    fn next_nv21(&mut self, size: Size) -> Vec<u8> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let w = size.width as usize;
        let h = size.height as usize;
        let len = PixelFormat::Nv21
            .frame_len(size.width, size.height)
            .unwrap_or(w * h);
        let jitter = rand::random::<u8>() % 8;
        let shift = self.frame_count as usize + self.scene_state as usize * 32;

        let mut data = vec![128u8; len];
        for (row, line) in data[..w * h].chunks_exact_mut(w.max(1)).enumerate() {
            for (col, luma) in line.iter_mut().enumerate() {
                *luma = ((col + row + shift) % 224) as u8 + jitter;
            }
        }
        data
    }
}
