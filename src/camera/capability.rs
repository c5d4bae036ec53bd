use anyhow::Result;

/// Permission check guarding camera acquisition.
///
/// `request` only asks; the decision comes back later through
/// `CameraManager::on_capability_result`.
pub trait CapabilityGate: Send {
    fn is_granted(&self) -> bool;

    fn request(&mut self) -> Result<()>;
}

/// Gate with a constant answer. Requests are counted and otherwise ignored.
#[derive(Clone, Debug)]
pub struct FixedCapabilityGate {
    granted: bool,
    requests: u32,
}

impl FixedCapabilityGate {
    pub fn granted() -> Self {
        Self {
            granted: true,
            requests: 0,
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            requests: 0,
        }
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

impl CapabilityGate for FixedCapabilityGate {
    fn is_granted(&self) -> bool {
        self.granted
    }

    fn request(&mut self) -> Result<()> {
        self.requests += 1;
        log::info!("camera capability requested (answer will be: {})", self.granted);
        Ok(())
    }
}
