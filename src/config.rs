use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::camera::{CameraSettings, Size};
use crate::normalize::{Normalizer, Rotation};

const DEFAULT_THROTTLE_MS: u64 = 500;
const DEFAULT_JPEG_QUALITY: u8 = 100;
const DEFAULT_ROTATION_DEGREES: u32 = 90;
const DEFAULT_RECOGNIZER: &str = "scripted";
const DEFAULT_RECOGNIZER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_MIN_PREVIEW_WIDTH: u32 = 1280;
const DEFAULT_MIN_PREVIEW_HEIGHT: u32 = 720;
const DEFAULT_AUTOFOCUS_INTERVAL_MS: u64 = 2_000;
const DEFAULT_AUTOFOCUS_INITIAL_DELAY_MS: u64 = 1_000;
const DEFAULT_CLEAR_AFTER_MS: u64 = 2_000;

#[derive(Debug, Deserialize, Default)]
struct TextcamConfigFile {
    throttle: Option<ThrottleConfigFile>,
    normalize: Option<NormalizeConfigFile>,
    recognizer: Option<RecognizerConfigFile>,
    camera: Option<CameraConfigFile>,
    surface: Option<SurfaceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThrottleConfigFile {
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct NormalizeConfigFile {
    jpeg_quality: Option<u8>,
    rotation_degrees: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RecognizerConfigFile {
    backend: Option<String>,
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    scripted_texts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    fps: Option<u32>,
    min_preview_width: Option<u32>,
    min_preview_height: Option<u32>,
    autofocus_interval_ms: Option<u64>,
    autofocus_initial_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SurfaceConfigFile {
    clear_after_ms: Option<u64>,
    content_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TextcamConfig {
    pub throttle_interval: Duration,
    pub normalize: NormalizeSettings,
    pub recognizer: RecognizerSettings,
    pub camera: CameraDeviceSettings,
    pub surface: SurfaceSettings,
}

#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    pub jpeg_quality: u8,
    pub rotation: Rotation,
}

impl NormalizeSettings {
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.jpeg_quality, self.rotation)
    }
}

#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    pub backend: String,
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub scripted_texts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CameraDeviceSettings {
    pub device: String,
    pub fps: u32,
    pub min_preview: Size,
    pub autofocus_interval: Duration,
    pub autofocus_initial_delay: Duration,
}

impl CameraDeviceSettings {
    pub fn lifecycle(&self) -> CameraSettings {
        CameraSettings {
            min_preview: self.min_preview,
            focus_initial_delay: self.autofocus_initial_delay,
            focus_interval: self.autofocus_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceSettings {
    pub clear_after: Duration,
    pub content_url: Option<String>,
}

impl TextcamConfig {
    /// File named by `TEXTCAM_CONFIG` (if set), then env overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TEXTCAM_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file instead of `TEXTCAM_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TextcamConfigFile) -> Result<Self> {
        let throttle_interval = Duration::from_millis(
            file.throttle
                .and_then(|throttle| throttle.interval_ms)
                .unwrap_or(DEFAULT_THROTTLE_MS),
        );

        let normalize_file = file.normalize.unwrap_or_default();
        let normalize = NormalizeSettings {
            jpeg_quality: normalize_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            rotation: Rotation::from_degrees(
                normalize_file
                    .rotation_degrees
                    .unwrap_or(DEFAULT_ROTATION_DEGREES),
            )?,
        };

        let recognizer_file = file.recognizer.unwrap_or_default();
        let recognizer = RecognizerSettings {
            backend: recognizer_file
                .backend
                .unwrap_or_else(|| DEFAULT_RECOGNIZER.to_string()),
            endpoint: recognizer_file.endpoint,
            timeout: Duration::from_millis(
                recognizer_file
                    .timeout_ms
                    .unwrap_or(DEFAULT_RECOGNIZER_TIMEOUT_MS),
            ),
            scripted_texts: recognizer_file.scripted_texts.unwrap_or_default(),
        };

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraDeviceSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            fps: camera_file.fps.unwrap_or(DEFAULT_CAMERA_FPS),
            min_preview: Size::new(
                camera_file
                    .min_preview_width
                    .unwrap_or(DEFAULT_MIN_PREVIEW_WIDTH),
                camera_file
                    .min_preview_height
                    .unwrap_or(DEFAULT_MIN_PREVIEW_HEIGHT),
            ),
            autofocus_interval: Duration::from_millis(
                camera_file
                    .autofocus_interval_ms
                    .unwrap_or(DEFAULT_AUTOFOCUS_INTERVAL_MS),
            ),
            autofocus_initial_delay: Duration::from_millis(
                camera_file
                    .autofocus_initial_delay_ms
                    .unwrap_or(DEFAULT_AUTOFOCUS_INITIAL_DELAY_MS),
            ),
        };

        let surface_file = file.surface.unwrap_or_default();
        let surface = SurfaceSettings {
            clear_after: Duration::from_millis(
                surface_file
                    .clear_after_ms
                    .unwrap_or(DEFAULT_CLEAR_AFTER_MS),
            ),
            content_url: surface_file.content_url,
        };

        Ok(Self {
            throttle_interval,
            normalize,
            recognizer,
            camera,
            surface,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(ms) = env_millis("TEXTCAM_THROTTLE_MS")? {
            self.throttle_interval = ms;
        }
        if let Ok(backend) = std::env::var("TEXTCAM_RECOGNIZER") {
            if !backend.trim().is_empty() {
                self.recognizer.backend = backend.trim().to_string();
            }
        }
        if let Ok(endpoint) = std::env::var("TEXTCAM_RECOGNIZER_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.recognizer.endpoint = Some(endpoint);
            }
        }
        if let Some(ms) = env_millis("TEXTCAM_RECOGNIZER_TIMEOUT_MS")? {
            self.recognizer.timeout = ms;
        }
        if let Ok(device) = std::env::var("TEXTCAM_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Some(ms) = env_millis("TEXTCAM_CLEAR_AFTER_MS")? {
            self.surface.clear_after = ms;
        }
        if let Ok(url) = std::env::var("TEXTCAM_CONTENT_URL") {
            if !url.trim().is_empty() {
                self.surface.content_url = Some(url);
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.throttle_interval.is_zero() {
            return Err(anyhow!("throttle interval must be greater than zero"));
        }
        if self.recognizer.timeout.is_zero() {
            return Err(anyhow!("recognizer timeout must be greater than zero"));
        }
        if !(1..=100).contains(&self.normalize.jpeg_quality) {
            return Err(anyhow!(
                "jpeg quality must be between 1 and 100, got {}",
                self.normalize.jpeg_quality
            ));
        }
        if self.camera.fps == 0 {
            return Err(anyhow!("camera fps must be >= 1"));
        }
        self.recognizer.backend = self.recognizer.backend.to_lowercase();
        if self.recognizer.backend == "http" && self.recognizer.endpoint.is_none() {
            return Err(anyhow!("http recognizer requires recognizer.endpoint"));
        }
        Ok(())
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(value) => {
            let ms: u64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("{} must be an integer number of milliseconds", key))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<TextcamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
