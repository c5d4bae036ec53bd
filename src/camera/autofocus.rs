use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::device::CameraDevice;
use crate::clock::PipelineClock;

pub const DEFAULT_FOCUS_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_FOCUS_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Running autofocus cycle. Dropping the handle without `stop` also ends the
/// cycle, but only `stop` waits for it.
pub struct AutofocusCycle {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl AutofocusCycle {
    /// Trigger a focus pass after `initial_delay`, then every `interval`,
    /// until stopped. Failed passes are logged and the cycle continues.
    pub fn spawn(
        device: Arc<Mutex<dyn CameraDevice>>,
        clock: Arc<PipelineClock>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = std::thread::Builder::new()
            .name("autofocus".to_string())
            .spawn(move || {
                let mut wait = initial_delay;
                loop {
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    focus_pass(&device, &clock);
                    wait = interval;
                }
            })
            .context("spawn autofocus thread")?;
        Ok(Self {
            stop: Some(stop_tx),
            join: Some(join),
        })
    }

    /// End the cycle and wait for an in-progress pass to finish.
    pub fn stop(mut self) -> Result<()> {
        self.stop.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("autofocus thread panicked"))?;
        }
        Ok(())
    }
}

fn focus_pass(device: &Arc<Mutex<dyn CameraDevice>>, clock: &PipelineClock) {
    let mut guard = match device.lock() {
        Ok(guard) => guard,
        Err(_) => {
            log::error!("autofocus: camera lock poisoned");
            return;
        }
    };
    match guard.auto_focus() {
        Ok(success) => log::debug!("autofocus: result {}", success),
        Err(err) => log::warn!("autofocus: pass failed: {:#}", err),
    }
    clock.record_focus();
}
