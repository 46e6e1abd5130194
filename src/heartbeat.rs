//! Dead-man's-switch heartbeat delivery.
//!
//! Success is `POST <url>` with an empty body; failure is `POST <url>/fail`
//! with the diagnostic as a `text/plain` body. Both require a 2xx answer.

use crate::aggregate::AggregateResult;
use crate::config::{HeartbeatConfig, NotifyConfig};
use crate::error::NotifyError;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// A heartbeat check URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatEndpoint {
    url: Url,
}

impl HeartbeatEndpoint {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn success_url(&self) -> Url {
        self.url.clone()
    }

    pub fn fail_url(&self) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("fail");
        }
        url
    }

    /// Whether both endpoints address the same check, ignoring a trailing `/`
    pub fn same_check(&self, other: &HeartbeatEndpoint) -> bool {
        self.fail_url() == other.fail_url()
    }

    pub fn url_for(&self, signal: &Signal) -> Url {
        match signal {
            Signal::Success => self.success_url(),
            Signal::Failure { .. } => self.fail_url(),
        }
    }
}

impl fmt::Display for HeartbeatEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Success,
    Failure { message: String },
}

impl Signal {
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Which health check a signal reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Video-management service reachable
    Service,
    /// All cameras up
    Cameras,
    /// Service and cameras share one endpoint
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSignal {
    pub check: CheckKind,
    pub endpoint: HeartbeatEndpoint,
    pub signal: Signal,
}

impl PlannedSignal {
    fn new(check: CheckKind, url: &Url, signal: Signal) -> Self {
        Self {
            check,
            endpoint: HeartbeatEndpoint::new(url.clone()),
            signal,
        }
    }
}

/// The service endpoint, when it exists and is not the cameras endpoint
fn separate_service(heartbeat: &HeartbeatConfig) -> Option<&Url> {
    let service = heartbeat.service.as_ref()?;
    let cameras = HeartbeatEndpoint::new(heartbeat.cameras.clone());
    if HeartbeatEndpoint::new(service.clone()).same_check(&cameras) {
        None
    } else {
        Some(service)
    }
}

/// Signals to send for an aggregated probing pass, in delivery order.
///
/// Each endpoint receives exactly one signal. When the session failed only
/// the service check is reported; the camera check is left to time out.
pub fn plan_signals(heartbeat: &HeartbeatConfig, result: &AggregateResult) -> Vec<PlannedSignal> {
    let cameras_signal = match result.cameras_message() {
        Some(message) => Signal::failure(message),
        None => Signal::Success,
    };
    let service_failure = result.service_message().map(Signal::failure);

    match separate_service(heartbeat) {
        Some(service) => match service_failure {
            Some(failure) => vec![PlannedSignal::new(CheckKind::Service, service, failure)],
            None => vec![
                PlannedSignal::new(CheckKind::Service, service, Signal::Success),
                PlannedSignal::new(CheckKind::Cameras, &heartbeat.cameras, cameras_signal),
            ],
        },
        None => vec![PlannedSignal::new(
            combined_or_cameras(heartbeat),
            &heartbeat.cameras,
            service_failure.unwrap_or(cameras_signal),
        )],
    }
}

/// Single failure signal for a run that could not probe at all
pub fn plan_failure(heartbeat: &HeartbeatConfig, message: &str) -> PlannedSignal {
    let signal = Signal::failure(message);
    match separate_service(heartbeat) {
        Some(service) => PlannedSignal::new(CheckKind::Service, service, signal),
        None => PlannedSignal::new(combined_or_cameras(heartbeat), &heartbeat.cameras, signal),
    }
}

fn combined_or_cameras(heartbeat: &HeartbeatConfig) -> CheckKind {
    if heartbeat.service.is_some() {
        CheckKind::Combined
    } else {
        CheckKind::Cameras
    }
}

/// Delivery retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&NotifyConfig::default())
    }
}

impl From<&NotifyConfig> for RetryPolicy {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

enum AttemptFailure {
    Timeout,
    Transport(String),
    Status(u16),
}

impl AttemptFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status(status) => *status >= 500 || *status == 429 || *status == 408,
        }
    }

    fn into_error(self, url: &Url, attempts: u32, timeout: Duration) -> NotifyError {
        let url = url.to_string();
        match self {
            Self::Timeout => NotifyError::Timeout {
                url,
                attempts,
                timeout,
            },
            Self::Transport(reason) => NotifyError::Transport {
                url,
                attempts,
                reason,
            },
            Self::Status(status) => NotifyError::Status {
                url,
                attempts,
                status,
            },
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Transport(reason) => write!(f, "{}", reason),
            Self::Status(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Sends heartbeat signals with bounded timeouts and retries
pub struct HeartbeatNotifier {
    http: reqwest::Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl HeartbeatNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            http,
            timeout: config.timeout,
            policy: RetryPolicy::from(config),
        })
    }

    /// Deliver planned signals in order, stopping at the first delivery failure
    pub async fn deliver(&self, plan: &[PlannedSignal]) -> Result<(), NotifyError> {
        for planned in plan {
            debug!("Reporting {:?} check", planned.check);
            self.send(&planned.endpoint, &planned.signal).await?;
        }
        Ok(())
    }

    /// Deliver one signal, retrying transient failures
    pub async fn send(
        &self,
        endpoint: &HeartbeatEndpoint,
        signal: &Signal,
    ) -> Result<(), NotifyError> {
        let url = endpoint.url_for(signal);
        match signal {
            Signal::Success => info!("Sending ping to {} ...", url),
            Signal::Failure { message } => {
                info!("Sending fail ping to {}: \"{}\" ...", url, message)
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let failure = match self.attempt(&url, signal).await {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= self.policy.max_attempts {
                return Err(failure.into_error(&url, attempt, self.timeout));
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                "Ping to {} failed (attempt {}/{}): {}; retrying in {:?}",
                url, attempt, self.policy.max_attempts, failure, delay
            );
            sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &Url, signal: &Signal) -> Result<(), AttemptFailure> {
        let request = match signal {
            Signal::Success => self.http.post(url.clone()),
            Signal::Failure { message } => self
                .http
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(message.clone()),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptFailure::Timeout
            } else {
                AttemptFailure::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("{} answered {}", url, status);
            Ok(())
        } else {
            Err(AttemptFailure::Status(status.as_u16()))
        }
    }
}
