use crate::error::NotifyError;

/// Terminal result of one watchdog run
#[derive(Debug)]
pub enum RunOutcome {
    /// Every check passed and every success signal was delivered
    Healthy,
    /// A failure signal carrying `message` was delivered
    Unhealthy { message: String },
    /// A signal could not be delivered; no further notification is attempted
    NotifyFailed(NotifyError),
}

impl RunOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Healthy => 0,
            Self::Unhealthy { .. } | Self::NotifyFailed(_) => 1,
        }
    }
}
