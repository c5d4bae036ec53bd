//! textcamd - live camera text recognition daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by TEXTCAM_CONFIG, then env overrides)
//! 2. Starts the surface thread over a headless search document
//! 3. Acquires the configured camera once the capability is granted
//! 4. Throttles, normalizes and recognizes preview frames
//! 5. Delivers sanitized text to the surface until Ctrl-C or `--seconds`

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use textcam::camera::{
    CameraManager, CameraState, FixedCapabilityGate, SurfaceGeometry, SyntheticCamera,
    SyntheticCameraConfig,
};
use textcam::recognize::{RecognitionBackend, RecognizerRegistry, ScriptedRecognizer};
use textcam::surface::{InMemoryDocument, LogDisplay, SharedDocument, SurfaceLoop};
use textcam::{FrameSink, PipelineClock, RecognitionPipeline, TextcamConfig};

const DEMO_SCRIPT: [&str; 4] = ["", "Café au lait", "  ", "Order #42: 2x espresso!"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file (overrides TEXTCAM_CONFIG).
    #[arg(long, env = "TEXTCAM_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,
    /// Answer the camera capability request with a denial.
    #[arg(long)]
    deny_camera: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = TextcamConfig::load_from(args.config.as_deref())?;
    log::info!(
        "textcamd {} starting: throttle={}ms recognizer={} timeout={}ms camera={}",
        env!("CARGO_PKG_VERSION"),
        cfg.throttle_interval.as_millis(),
        cfg.recognizer.backend,
        cfg.recognizer.timeout.as_millis(),
        cfg.camera.device
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let backend = select_backend(&cfg)?;
    let backend_for_shutdown = backend.clone();
    if let Err(err) = backend.warm_up() {
        log::warn!("recognizer {} warm-up failed: {:#}", backend.name(), err);
    }

    let document = SharedDocument::new(InMemoryDocument::search_page());
    let (surface, surface_join) =
        SurfaceLoop::new(LogDisplay, document.clone(), cfg.surface.clear_after).spawn()?;
    match &cfg.surface.content_url {
        Some(url) => log::info!("content surface loaded {}", url),
        None => log::info!("content surface loaded built-in search page"),
    }
    surface.content_loaded()?;

    let clock = Arc::new(PipelineClock::new());
    let pipeline = Arc::new(RecognitionPipeline::new(
        clock.clone(),
        cfg.throttle_interval,
        cfg.normalize.normalizer(),
        backend,
        cfg.recognizer.timeout,
        surface.clone(),
    ));

    let camera = SyntheticCamera::new(SyntheticCameraConfig {
        device: cfg.camera.device.clone(),
        fps: cfg.camera.fps,
        ..SyntheticCameraConfig::default()
    })?;
    let gate = if args.deny_camera {
        FixedCapabilityGate::denied()
    } else {
        FixedCapabilityGate::granted()
    };
    let sink: Arc<dyn FrameSink> = pipeline.clone();
    let mut manager = CameraManager::new(camera, gate, sink, clock, cfg.camera.lifecycle());

    let geometry = SurfaceGeometry {
        width: cfg.camera.min_preview.height,
        height: cfg.camera.min_preview.width,
    };
    let mut state = manager.surface_ready(geometry)?;
    if state == CameraState::RequestingCapability {
        state = manager.on_capability_result(!args.deny_camera)?;
    }
    if state != CameraState::Previewing {
        log::warn!("camera not previewing (state {:?}); no text will be recognized", state);
    }

    let deadline = args
        .seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last_health_log = Instant::now();
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            let submissions = document.lock()?.submissions().len();
            log::info!(
                "camera={:?} frames={} admitted={} dropped={} in_flight={} workers={} refused={} delivered={} discarded={} submissions={}",
                manager.state(),
                stats.frames_seen,
                stats.frames_admitted,
                stats.frames_dropped,
                pipeline.in_flight(),
                pipeline.live_workers(),
                stats.requests_refused,
                stats.texts_delivered,
                stats.results_discarded,
                submissions
            );
            last_health_log = Instant::now();
        }
    }

    log::info!("shutting down");
    manager.surface_destroyed();
    surface.shutdown()?;
    let surface_stats = surface_join
        .join()
        .map_err(|_| anyhow!("surface thread panicked"))?;
    log::info!(
        "surface: delivered={} submitted={} cleared={}",
        surface_stats.delivered,
        surface_stats.submitted,
        surface_stats.cleared
    );
    if let Err(err) = backend_for_shutdown.shutdown() {
        log::warn!(
            "recognizer {} shutdown failed: {:#}",
            backend_for_shutdown.name(),
            err
        );
    }
    Ok(())
}

fn select_backend(cfg: &TextcamConfig) -> Result<Arc<dyn RecognitionBackend>> {
    let mut registry = RecognizerRegistry::new();
    let script: Vec<String> = if cfg.recognizer.scripted_texts.is_empty() {
        DEMO_SCRIPT.iter().map(|s| s.to_string()).collect()
    } else {
        cfg.recognizer.scripted_texts.clone()
    };
    registry.register(ScriptedRecognizer::new(script));

    #[cfg(feature = "recognize-http")]
    {
        if let Some(endpoint) = &cfg.recognizer.endpoint {
            registry.register(textcam::recognize::HttpRecognizer::new(
                endpoint,
                cfg.recognizer.timeout,
            )?);
        }
    }

    registry.set_default(&cfg.recognizer.backend)?;
    log::info!("recognizers available: {}", registry.list().join(", "));
    registry
        .default_backend()
        .ok_or_else(|| anyhow!("no recognizer registered"))
}
