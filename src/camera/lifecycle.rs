//! Camera session lifecycle.
//!
//! ```text
//! Uninitialized --surface ready, granted--> Acquired --start--> Previewing
//! Uninitialized --surface ready, missing--> RequestingCapability
//! RequestingCapability --granted--> Acquired ; --denied--> Uninitialized
//! Previewing --surface changed--> Previewing (rebind, errors logged)
//! Acquired/Previewing --surface destroyed / pause--> Released
//! Released --surface ready--> (as Uninitialized)
//! ```
//!
//! The manager owns the device and at most one session at a time. Resource
//! faults are logged and leave the manager `Uninitialized`; only transitions
//! that make no sense in the current state return an error.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use super::autofocus::{AutofocusCycle, DEFAULT_FOCUS_INITIAL_DELAY, DEFAULT_FOCUS_INTERVAL};
use super::capability::CapabilityGate;
use super::device::{
    select_focus_mode, select_preview_size, CameraDevice, PreviewParams, Size, SurfaceGeometry,
};
use crate::clock::PipelineClock;
use crate::frame::{FrameSink, PixelFormat};

pub const DEFAULT_MIN_PREVIEW: Size = Size::new(1280, 720);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraState {
    Uninitialized,
    RequestingCapability,
    Acquired,
    Previewing,
    Released,
}

/// Tunables for session setup and the autofocus cycle.
#[derive(Clone, Copy, Debug)]
pub struct CameraSettings {
    pub min_preview: Size,
    pub focus_initial_delay: Duration,
    pub focus_interval: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            min_preview: DEFAULT_MIN_PREVIEW,
            focus_initial_delay: DEFAULT_FOCUS_INITIAL_DELAY,
            focus_interval: DEFAULT_FOCUS_INTERVAL,
        }
    }
}

/// One acquire-to-release lifetime of the sensor.
struct CameraSession {
    generation: u64,
    params: PreviewParams,
    autofocus: Option<AutofocusCycle>,
}

/// Owns the camera device and drives it from host surface events.
pub struct CameraManager {
    device: Arc<Mutex<dyn CameraDevice>>,
    gate: Box<dyn CapabilityGate>,
    sink: Arc<dyn FrameSink>,
    clock: Arc<PipelineClock>,
    settings: CameraSettings,
    state: CameraState,
    surface: Option<SurfaceGeometry>,
    session: Option<CameraSession>,
    generation: u64,
}

impl CameraManager {
    pub fn new<D, G>(
        device: D,
        gate: G,
        sink: Arc<dyn FrameSink>,
        clock: Arc<PipelineClock>,
        settings: CameraSettings,
    ) -> Self
    where
        D: CameraDevice + 'static,
        G: CapabilityGate + 'static,
    {
        clock.reset();
        Self {
            device: Arc::new(Mutex::new(device)),
            gate: Box::new(gate),
            sink,
            clock,
            settings,
            state: CameraState::Uninitialized,
            surface: None,
            session: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Generation of the live session, if one is acquired.
    pub fn session_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.generation)
    }

    /// Preview parameters of the live session.
    pub fn preview_params(&self) -> Option<PreviewParams> {
        self.session.as_ref().map(|session| session.params)
    }

    /// Host surface exists. Acquires the camera when the capability is
    /// granted, otherwise requests it.
    pub fn surface_ready(&mut self, surface: SurfaceGeometry) -> Result<CameraState> {
        match self.state {
            CameraState::Uninitialized | CameraState::Released => {}
            other => bail!("surface ready while {:?}", other),
        }
        self.surface = Some(surface);

        if self.gate.is_granted() {
            self.acquire();
        } else {
            self.state = CameraState::RequestingCapability;
            if let Err(err) = self.gate.request() {
                log::error!("camera: capability request failed: {:#}", err);
                self.state = CameraState::Uninitialized;
            }
        }
        Ok(self.state)
    }

    /// Answer to an earlier capability request.
    pub fn on_capability_result(&mut self, granted: bool) -> Result<CameraState> {
        if self.state != CameraState::RequestingCapability {
            bail!("capability result while {:?}", self.state);
        }
        if granted {
            self.acquire();
        } else {
            log::warn!("camera: capability denied; pipeline will not start");
            self.state = CameraState::Uninitialized;
        }
        Ok(self.state)
    }

    /// Surface geometry changed. A previewing session is stopped, rebound
    /// and restarted; failures are logged and not fatal.
    pub fn surface_changed(&mut self, surface: SurfaceGeometry) -> Result<CameraState> {
        self.surface = Some(surface);
        if self.state != CameraState::Previewing {
            return Ok(self.state);
        }
        let sink = self.sink.clone();
        let restart = self.lock_device().and_then(|mut device| {
            device.stop_preview()?;
            device.bind_surface(surface)?;
            device.start_preview(sink)
        });
        if let Err(err) = restart {
            log::error!("camera: error restarting preview: {:#}", err);
        }
        Ok(self.state)
    }

    /// Surface gone. Stops streaming and releases the sensor regardless of
    /// outstanding recognition requests; their results will be discarded.
    pub fn surface_destroyed(&mut self) -> CameraState {
        self.surface = None;
        match self.state {
            CameraState::Acquired | CameraState::Previewing => {
                self.teardown();
                self.state = CameraState::Released;
            }
            CameraState::RequestingCapability => self.state = CameraState::Uninitialized,
            CameraState::Uninitialized | CameraState::Released => {}
        }
        self.state
    }

    /// Host surface hidden. Same as the surface going away.
    pub fn pause(&mut self) -> CameraState {
        self.surface_destroyed()
    }

    fn acquire(&mut self) {
        let Some(surface) = self.surface else {
            log::warn!("camera: no surface to bind; staying uninitialized");
            self.state = CameraState::Uninitialized;
            return;
        };
        self.clock.reset();

        let params = match self.open_and_configure() {
            Ok(params) => params,
            Err(err) => {
                log::error!("camera: error initializing camera: {:#}", err);
                self.release_device();
                self.state = CameraState::Uninitialized;
                return;
            }
        };
        self.state = CameraState::Acquired;

        self.generation += 1;
        let generation = self.generation;
        self.sink.on_session_started(generation);

        let sink = self.sink.clone();
        let started = self.lock_device().and_then(|mut device| {
            device.bind_surface(surface)?;
            device.start_preview(sink)
        });
        if let Err(err) = started {
            log::error!("camera: error starting preview: {:#}", err);
            self.sink.on_session_ended(generation);
            self.release_device();
            self.state = CameraState::Uninitialized;
            return;
        }

        let autofocus = match AutofocusCycle::spawn(
            self.device.clone(),
            self.clock.clone(),
            self.settings.focus_initial_delay,
            self.settings.focus_interval,
        ) {
            Ok(cycle) => Some(cycle),
            Err(err) => {
                log::warn!("camera: autofocus cycle unavailable: {:#}", err);
                None
            }
        };

        self.session = Some(CameraSession {
            generation,
            params,
            autofocus,
        });
        self.state = CameraState::Previewing;
        log::info!(
            "camera: session {} previewing {}x{} focus={:?}",
            generation,
            params.size.width,
            params.size.height,
            params.focus_mode
        );
    }

    fn open_and_configure(&self) -> Result<PreviewParams> {
        let mut device = self.lock_device()?;
        device.open()?;
        let capabilities = device.capabilities()?;
        let size = select_preview_size(&capabilities.preview_sizes, self.settings.min_preview)
            .ok_or_else(|| anyhow!("{} reports no preview sizes", device.name()))?;
        let params = PreviewParams {
            focus_mode: select_focus_mode(&capabilities.focus_modes),
            size,
            format: PixelFormat::Nv21,
        };
        device.configure(&params)?;
        Ok(params)
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(autofocus) = session.autofocus {
                if let Err(err) = autofocus.stop() {
                    log::error!("camera: {:#}", err);
                }
            }
            let stopped = self
                .lock_device()
                .and_then(|mut device| device.stop_preview());
            if let Err(err) = stopped {
                log::error!("camera: error stopping preview: {:#}", err);
            }
            self.sink.on_session_ended(session.generation);
            log::info!("camera: session {} released", session.generation);
        }
        self.release_device();
        self.clock.reset();
    }

    fn release_device(&self) {
        let released = self.lock_device().and_then(|mut device| device.release());
        if let Err(err) = released {
            log::error!("camera: error releasing camera: {:#}", err);
        }
    }

    fn lock_device(&self) -> Result<MutexGuard<'_, dyn CameraDevice + 'static>> {
        self.device
            .lock()
            .map_err(|_| anyhow!("camera lock poisoned"))
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        if matches!(
            self.state,
            CameraState::Acquired | CameraState::Previewing
        ) {
            self.teardown();
            self.state = CameraState::Released;
        }
    }
}
