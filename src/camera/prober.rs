use super::status::ProbeOutcome;
use async_trait::async_trait;

/// A strategy for determining the status of every camera in the fleet
#[async_trait]
pub trait CameraProber: Send {
    /// Run one probing pass. A session-level failure fails the whole pass;
    /// per-camera failures are reported as down cameras.
    async fn probe(&mut self) -> ProbeOutcome;

    /// Short strategy name for log messages
    fn strategy(&self) -> &'static str;
}
