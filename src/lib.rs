pub mod aggregate;
pub mod app;
pub mod camera;
pub mod config;
pub mod credentials;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod paths;

#[cfg(test)]
mod test_support;

pub use aggregate::{aggregate, AggregateResult, Verdict};
pub use app::{RunOutcome, Watchdog};
pub use camera::{
    BlueIrisClient, CameraProber, CameraStatus, DirectProber, ManagedApiProber, ProbeOutcome,
    VideoManagementApi,
};
pub use config::{ProbeStrategy, WatchdogConfig, DEFAULT_CONFIG_TEMPLATE};
pub use credentials::{CredentialResolver, CredentialStore, KeyringStore, MemoryStore, Secret};
pub use error::{
    ApiError, ConfigError, CredentialError, NotifyError, ProbeCameraError, ProbeSessionError,
    Result, WatchdogError,
};
pub use heartbeat::{plan_signals, HeartbeatEndpoint, HeartbeatNotifier, PlannedSignal, Signal};
pub use logging::{init_logging, LogOptions};
