use crate::error::{ProbeCameraError, ProbeSessionError};

/// Result of a whole probing pass: per-camera statuses, or a session failure
pub type ProbeOutcome = std::result::Result<Vec<CameraStatus>, ProbeSessionError>;

/// Camera status as reported by the Blue Iris API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCamera {
    pub display_name: String,
    pub short_name: String,
    pub enabled: bool,
    pub online: bool,
    pub no_signal: bool,
    /// Set when the camera could not be described; the camera counts as down
    pub error: Option<ProbeCameraError>,
}

impl ManagedCamera {
    /// Camera whose configuration could not be fetched
    pub fn undetermined(display_name: String, short_name: String, error: ProbeCameraError) -> Self {
        Self {
            display_name,
            short_name,
            enabled: false,
            online: false,
            no_signal: true,
            error: Some(error),
        }
    }

    pub fn is_up(&self) -> bool {
        self.error.is_none() && self.enabled && self.online && !self.no_signal
    }
}

/// Camera status from a direct reachability probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedCamera {
    pub display_name: String,
    pub identifier: String,
    pub reachable: bool,
    pub error: Option<ProbeCameraError>,
}

impl ProbedCamera {
    pub fn is_up(&self) -> bool {
        self.reachable
    }
}

/// Strategy-agnostic view consumed by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Managed(ManagedCamera),
    Probed(ProbedCamera),
}

impl CameraStatus {
    pub fn is_up(&self) -> bool {
        match self {
            Self::Managed(camera) => camera.is_up(),
            Self::Probed(camera) => camera.is_up(),
        }
    }

    /// Name used in the down-list. Managed cameras carry their short name too.
    pub fn label(&self) -> String {
        match self {
            Self::Managed(camera) => format!("{} ({})", camera.display_name, camera.short_name),
            Self::Probed(camera) => camera.display_name.clone(),
        }
    }

    pub fn error(&self) -> Option<&ProbeCameraError> {
        match self {
            Self::Managed(camera) => camera.error.as_ref(),
            Self::Probed(camera) => camera.error.as_ref(),
        }
    }
}

impl From<ManagedCamera> for CameraStatus {
    fn from(camera: ManagedCamera) -> Self {
        Self::Managed(camera)
    }
}

impl From<ProbedCamera> for CameraStatus {
    fn from(camera: ProbedCamera) -> Self {
        Self::Probed(camera)
    }
}
