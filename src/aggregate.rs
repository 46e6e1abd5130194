use crate::camera::ProbeOutcome;
use crate::error::ProbeSessionError;
use std::collections::BTreeSet;

/// Merged result of a probing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    /// Labels of cameras that are down, sorted and without duplicates
    pub down: Vec<String>,
    /// Number of cameras that were examined
    pub total: usize,
    /// Set when the prober could not establish its session
    pub session_error: Option<ProbeSessionError>,
}

/// Overall health verdict for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    CamerasDown { message: String },
    ServiceDown { message: String },
}

impl AggregateResult {
    pub fn session_ok(&self) -> bool {
        self.session_error.is_none()
    }

    pub fn is_healthy(&self) -> bool {
        self.session_ok() && self.down.is_empty()
    }

    /// Diagnostic for the camera check, `None` when every camera is up
    /// or when the session failed (no down-list exists then)
    pub fn cameras_message(&self) -> Option<String> {
        if !self.session_ok() || self.down.is_empty() {
            return None;
        }
        Some(format!("Camera(s) DOWN: {}.", self.down.join(", ")))
    }

    /// Diagnostic for the service check, `None` when the session was healthy
    pub fn service_message(&self) -> Option<String> {
        self.session_error.as_ref().map(ToString::to_string)
    }

    pub fn verdict(&self) -> Verdict {
        if let Some(message) = self.service_message() {
            Verdict::ServiceDown { message }
        } else if let Some(message) = self.cameras_message() {
            Verdict::CamerasDown { message }
        } else {
            Verdict::Healthy
        }
    }
}

/// Fold a probing pass into a verdict. Independent of camera order.
pub fn aggregate(outcome: &ProbeOutcome) -> AggregateResult {
    match outcome {
        Err(error) => AggregateResult {
            down: Vec::new(),
            total: 0,
            session_error: Some(error.clone()),
        },
        Ok(statuses) => {
            let down: BTreeSet<String> = statuses
                .iter()
                .filter(|status| !status.is_up())
                .map(|status| status.label())
                .collect();

            AggregateResult {
                down: down.into_iter().collect(),
                total: statuses.len(),
                session_error: None,
            }
        }
    }
}
