use super::prober::CameraProber;
use super::status::{CameraStatus, ProbeOutcome, ProbedCamera};
use crate::config::{CameraEntry, DirectProbeConfig};
use crate::error::ProbeCameraError;
use async_trait::async_trait;
use futures::future::join_all;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

/// Probes every camera address concurrently with TCP connection attempts
pub struct DirectProber {
    cameras: Vec<CameraEntry>,
    attempts: u32,
    timeout: Duration,
    default_port: u16,
}

impl DirectProber {
    pub fn new(config: &DirectProbeConfig) -> Self {
        Self {
            cameras: config.cameras.clone(),
            attempts: config.attempts.max(1),
            timeout: config.timeout,
            default_port: config.default_port,
        }
    }

    /// Upper bound on the wall time of one probing pass
    pub fn max_duration(&self) -> Duration {
        self.timeout * self.attempts
    }

    async fn probe_camera(&self, camera: &CameraEntry) -> CameraStatus {
        let result =
            probe_address(&camera.address, self.default_port, self.attempts, self.timeout).await;

        let status = ProbedCamera {
            display_name: camera.display_name.clone(),
            identifier: camera.identifier.clone(),
            reachable: result.is_ok(),
            error: result.err(),
        };

        match &status.error {
            None => info!("{} ({}) is UP.", status.display_name, camera.address),
            Some(e) => info!("{} is DOWN: {}.", status.display_name, e),
        }

        status.into()
    }
}

#[async_trait]
impl CameraProber for DirectProber {
    async fn probe(&mut self) -> ProbeOutcome {
        info!(
            "Probing {} camera(s), {} attempt(s) of {:?} each, at most {:?} ...",
            self.cameras.len(),
            self.attempts,
            self.timeout,
            self.max_duration()
        );

        let statuses = join_all(self.cameras.iter().map(|c| self.probe_camera(c))).await;
        Ok(statuses)
    }

    fn strategy(&self) -> &'static str {
        "direct"
    }
}

/// Split `host`, `host:port`, `ip` or `[v6]:port` into host and port
pub fn split_address(address: &str, default_port: u16) -> Result<(String, u16), ProbeCameraError> {
    let invalid = |reason: &str| ProbeCameraError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    if let Ok(socket) = address.parse::<SocketAddr>() {
        return Ok((socket.ip().to_string(), socket.port()));
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok((ip.to_string(), default_port));
    }
    if let Some(inner) = address.strip_prefix('[').and_then(|a| a.strip_suffix(']')) {
        let ip = inner
            .parse::<std::net::Ipv6Addr>()
            .map_err(|_| invalid("bad IPv6 address"))?;
        return Ok((ip.to_string(), default_port));
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(invalid("empty host"));
            }
            let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
            Ok((host.to_string(), port))
        }
        None if address.is_empty() => Err(invalid("empty host")),
        None => Ok((address.to_string(), default_port)),
    }
}

/// Try to open a TCP connection up to `attempts` times. Succeeds on the first
/// connection; each attempt, name resolution included, is bounded by `per_attempt`.
pub async fn probe_address(
    address: &str,
    default_port: u16,
    attempts: u32,
    per_attempt: Duration,
) -> Result<(), ProbeCameraError> {
    let (host, port) = split_address(address, default_port)?;

    for attempt in 1..=attempts {
        match timeout(per_attempt, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_stream)) => {
                debug!("{}:{} connected on attempt {}", host, port, attempt);
                return Ok(());
            }
            Ok(Err(e)) => {
                debug!("{}:{} attempt {}/{} failed: {}", host, port, attempt, attempts, e);
            }
            Err(_) => {
                debug!(
                    "{}:{} attempt {}/{} timed out after {:?}",
                    host, port, attempt, attempts, per_attempt
                );
            }
        }
    }

    Err(ProbeCameraError::Unreachable {
        address: format!("{}:{}", host, port),
        attempts,
    })
}
