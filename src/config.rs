use crate::error::ConfigError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Validated configuration for a single watchdog run
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub strategy: ProbeStrategy,
    pub heartbeat: HeartbeatConfig,
    pub notify: NotifyConfig,
}

/// How camera status is determined
#[derive(Debug, Clone)]
pub enum ProbeStrategy {
    /// Authenticated Blue Iris JSON API
    ManagedApi(ManagedApiConfig),
    /// TCP reachability checks against each camera address
    DirectProbe(DirectProbeConfig),
}

#[derive(Debug, Clone)]
pub struct ManagedApiConfig {
    pub url: Url,
    pub user: String,
    pub credential: CredentialRef,
    pub request_timeout: Duration,
}

/// Keyring lookup key for the Blue Iris password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRef {
    pub service: String,
    pub account: String,
}

#[derive(Debug, Clone)]
pub struct DirectProbeConfig {
    pub cameras: Vec<CameraEntry>,
    pub attempts: u32,
    pub timeout: Duration,
    pub default_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraEntry {
    pub identifier: String,
    pub address: String,
    pub model: Option<String>,
    pub display_name: String,
}

/// Heartbeat endpoints. `service` only exists for the managed strategy.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub service: Option<Url>,
    pub cameras: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Delivery attempts before giving up
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_delay: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(default_notify_timeout_seconds()),
            max_attempts: default_notify_max_attempts(),
            retry_delay: Duration::from_millis(default_notify_retry_delay_ms()),
        }
    }
}

// Untyped mirror of the TOML file. Everything optional so that validation can
// name the exact key that is missing.
#[derive(Debug, Deserialize)]
struct RawConfig {
    blueiris_url: Option<String>,
    blueiris_user: Option<String>,
    blueiris_ping_url: Option<String>,
    cameras_ping_url: Option<String>,
    credential_service: Option<String>,
    credential_account: Option<String>,
    #[serde(default)]
    cameras: BTreeMap<String, RawCamera>,
    blueiris: RawBlueIrisSettings,
    probe: RawProbeSettings,
    notify: RawNotifySettings,
}

#[derive(Debug, Deserialize)]
struct RawCamera {
    address: Option<String>,
    model: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlueIrisSettings {
    request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawProbeSettings {
    attempts: u32,
    timeout_ms: u64,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct RawNotifySettings {
    timeout_seconds: u64,
    max_attempts: u32,
    retry_delay_ms: u64,
}

impl WatchdogConfig {
    /// Load configuration from a TOML file plus `CAMPING__*` environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        let settings = Self::builder()?
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix("CAMPING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = Self::from_raw(settings.try_deserialize()?)?;
        info!("Configuration loaded from \"{}\"", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text (no environment overrides)
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::from_raw(settings.try_deserialize()?)
    }

    /// Short name of the probing strategy for log messages
    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            ProbeStrategy::ManagedApi(_) => "blueiris",
            ProbeStrategy::DirectProbe(_) => "direct",
        }
    }

    fn builder() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default(
                "blueiris.request_timeout_seconds",
                default_request_timeout_seconds(),
            )?
            .set_default("probe.attempts", default_probe_attempts())?
            .set_default("probe.timeout_ms", default_probe_timeout_ms())?
            .set_default("probe.port", default_probe_port())?
            .set_default("notify.timeout_seconds", default_notify_timeout_seconds())?
            .set_default("notify.max_attempts", default_notify_max_attempts())?
            .set_default("notify.retry_delay_ms", default_notify_retry_delay_ms())?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let notify = NotifyConfig {
            timeout: Duration::from_secs(positive(
                raw.notify.timeout_seconds,
                "notify.timeout_seconds",
            )?),
            max_attempts: positive(raw.notify.max_attempts, "notify.max_attempts")?,
            retry_delay: Duration::from_millis(raw.notify.retry_delay_ms),
        };

        let blueiris_url = non_empty(raw.blueiris_url);
        let has_cameras = !raw.cameras.is_empty();

        let (strategy, heartbeat) = match (blueiris_url, has_cameras) {
            (Some(_), true) => {
                return Err(ConfigError::Conflict {
                    first: "blueiris_url".to_string(),
                    second: "cameras".to_string(),
                })
            }
            (Some(url), false) => {
                let user = require(raw.blueiris_user, "blueiris_user")?;
                let url = parse_url(&url, "blueiris_url")?;
                let service_ping = parse_url(
                    &require(raw.blueiris_ping_url, "blueiris_ping_url")?,
                    "blueiris_ping_url",
                )?;
                let cameras_ping = parse_url(
                    &require(raw.cameras_ping_url, "cameras_ping_url")?,
                    "cameras_ping_url",
                )?;

                let credential = CredentialRef {
                    service: non_empty(raw.credential_service)
                        .unwrap_or_else(default_credential_service),
                    account: non_empty(raw.credential_account).unwrap_or_else(|| user.clone()),
                };

                let managed = ManagedApiConfig {
                    url,
                    user,
                    credential,
                    request_timeout: Duration::from_secs(positive(
                        raw.blueiris.request_timeout_seconds,
                        "blueiris.request_timeout_seconds",
                    )?),
                };

                (
                    ProbeStrategy::ManagedApi(managed),
                    HeartbeatConfig {
                        service: Some(service_ping),
                        cameras: cameras_ping,
                    },
                )
            }
            (None, true) => {
                let cameras_ping = parse_url(
                    &require(raw.cameras_ping_url, "cameras_ping_url")?,
                    "cameras_ping_url",
                )?;

                if non_empty(raw.blueiris_ping_url).is_some() {
                    warn!("\"blueiris_ping_url\" is ignored when probing cameras directly");
                }

                let cameras = raw
                    .cameras
                    .into_iter()
                    .map(|(identifier, camera)| {
                        let address =
                            require(camera.address, &format!("cameras.{}.address", identifier))?;
                        let display_name =
                            require(camera.name, &format!("cameras.{}.name", identifier))?;
                        Ok(CameraEntry {
                            identifier,
                            address,
                            model: non_empty(camera.model),
                            display_name,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;

                let direct = DirectProbeConfig {
                    cameras,
                    attempts: positive(raw.probe.attempts, "probe.attempts")?,
                    timeout: Duration::from_millis(positive(
                        raw.probe.timeout_ms,
                        "probe.timeout_ms",
                    )?),
                    default_port: positive(raw.probe.port, "probe.port")?,
                };

                (
                    ProbeStrategy::DirectProbe(direct),
                    HeartbeatConfig {
                        service: None,
                        cameras: cameras_ping,
                    },
                )
            }
            (None, false) => return Err(ConfigError::missing("blueiris_url or cameras")),
        };

        Ok(Self {
            strategy,
            heartbeat,
            notify,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    non_empty(value).ok_or_else(|| ConfigError::missing(key))
}

fn parse_url(value: &str, key: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ConfigError::invalid(key, "URL has no host")),
        scheme => Err(ConfigError::invalid(
            key,
            format!("unsupported scheme \"{}\"", scheme),
        )),
    }
}

fn positive<T>(value: T, key: &str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + Copy,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::invalid(key, "must be greater than 0"))
    }
}

// Default value functions
fn default_credential_service() -> String {
    "blueiris".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    20
}

fn default_probe_attempts() -> u32 {
    3
}
fn default_probe_timeout_ms() -> u64 {
    1000
}
fn default_probe_port() -> u16 {
    80
}

fn default_notify_timeout_seconds() -> u64 {
    20
}
fn default_notify_max_attempts() -> u32 {
    3
}
fn default_notify_retry_delay_ms() -> u64 {
    1000
}

/// Annotated configuration template printed by `--print-config`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# CamPing configuration

# --- Blue Iris strategy -------------------------------------------------
# Blue Iris server and login. The password is read from the OS keyring
# (service "blueiris", account = blueiris_user).
blueiris_url = "http://blueiris.local:81"
blueiris_user = "admin"
# credential_service = "blueiris"
# credential_account = "admin"

# healthchecks.io check for "Blue Iris reachable"
blueiris_ping_url = "https://hc-ping.com/00000000-0000-0000-0000-000000000001"

# healthchecks.io check for "all cameras up" (may equal blueiris_ping_url)
cameras_ping_url = "https://hc-ping.com/00000000-0000-0000-0000-000000000002"

# --- Direct probe strategy ----------------------------------------------
# Remove blueiris_url and list cameras instead:
# [cameras.frontdoor]
# address = "192.168.1.20:554"
# model = "Reolink RLC-810A"
# name = "Front Door"

[blueiris]
request_timeout_seconds = 20

[probe]
# Connection attempts per camera, per-attempt timeout and default port
attempts = 3
timeout_ms = 1000
port = 80

[notify]
timeout_seconds = 20
max_attempts = 3
retry_delay_ms = 1000
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANAGED: &str = r#"
blueiris_url = "http://bi.local:81"
blueiris_user = "admin"
blueiris_ping_url = "https://hc-ping.com/bi"
cameras_ping_url = "https://hc-ping.com/cams"
"#;

    const DIRECT: &str = r#"
cameras_ping_url = "https://hc-ping.com/cams"

[cameras.frontdoor]
address = "192.168.1.20"
model = "RLC-810A"
name = "Front Door"

[cameras.driveway]
address = "192.168.1.21:554"
name = "Driveway"
"#;

    fn missing_key(toml: &str) -> String {
        match WatchdogConfig::from_toml_str(toml) {
            Err(ConfigError::Missing { key }) => key,
            other => panic!("expected missing key error, got {:?}", other),
        }
    }

    #[test]
    fn test_managed_config() {
        let config = WatchdogConfig::from_toml_str(MANAGED).unwrap();

        match &config.strategy {
            ProbeStrategy::ManagedApi(managed) => {
                assert_eq!(managed.url.as_str(), "http://bi.local:81/");
                assert_eq!(managed.user, "admin");
                assert_eq!(
                    managed.credential,
                    CredentialRef {
                        service: "blueiris".to_string(),
                        account: "admin".to_string(),
                    }
                );
                assert_eq!(managed.request_timeout, Duration::from_secs(20));
            }
            other => panic!("expected managed strategy, got {:?}", other),
        }

        assert_eq!(
            config.heartbeat.service.as_ref().map(Url::as_str),
            Some("https://hc-ping.com/bi")
        );
        assert_eq!(config.heartbeat.cameras.as_str(), "https://hc-ping.com/cams");
        assert_eq!(config.notify, NotifyConfig::default());
        assert_eq!(config.strategy_name(), "blueiris");
    }

    #[test]
    fn test_direct_config() {
        let config = WatchdogConfig::from_toml_str(DIRECT).unwrap();
        assert!(config.heartbeat.service.is_none());

        let ProbeStrategy::DirectProbe(direct) = &config.strategy else {
            panic!("expected direct strategy");
        };

        assert_eq!(direct.attempts, 3);
        assert_eq!(direct.timeout, Duration::from_millis(1000));
        assert_eq!(direct.default_port, 80);
        assert_eq!(direct.cameras.len(), 2);

        let front = direct
            .cameras
            .iter()
            .find(|c| c.identifier == "frontdoor")
            .unwrap();
        assert_eq!(front.address, "192.168.1.20");
        assert_eq!(front.display_name, "Front Door");
        assert_eq!(front.model.as_deref(), Some("RLC-810A"));
    }

    #[test]
    fn test_missing_keys_are_named() {
        let without = |key: &str| {
            MANAGED
                .lines()
                .filter(|line| !line.starts_with(key))
                .collect::<Vec<_>>()
                .join("\n")
        };

        assert_eq!(missing_key(&without("blueiris_user")), "blueiris_user");
        assert_eq!(missing_key(&without("blueiris_ping_url")), "blueiris_ping_url");
        assert_eq!(missing_key(&without("cameras_ping_url")), "cameras_ping_url");
        assert_eq!(missing_key(""), "blueiris_url or cameras");
    }

    #[test]
    fn test_empty_cameras_table_names_both_strategies() {
        let toml = "cameras_ping_url = \"https://hc-ping.com/cams\"\n\n[cameras]\n";
        assert_eq!(missing_key(toml), "blueiris_url or cameras");

        let err = WatchdogConfig::from_toml_str(toml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"blueiris_url or cameras\" not found in configuration"
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let toml = MANAGED.replace("blueiris_user = \"admin\"", "blueiris_user = \"  \"");
        assert_eq!(missing_key(&toml), "blueiris_user");
    }

    #[test]
    fn test_camera_without_name() {
        let toml = r#"
cameras_ping_url = "https://hc-ping.com/cams"

[cameras.porch]
address = "10.0.0.5"
"#;
        assert_eq!(missing_key(toml), "cameras.porch.name");
    }

    #[test]
    fn test_invalid_url() {
        let toml = MANAGED.replace("https://hc-ping.com/cams", "ftp://hc-ping.com/cams");
        match WatchdogConfig::from_toml_str(&toml) {
            Err(err @ ConfigError::Invalid { .. }) => {
                assert_eq!(err.key(), Some("cameras_ping_url"));
            }
            other => panic!("expected invalid url error, got {:?}", other),
        }
    }

    #[test]
    fn test_both_strategies_conflict() {
        let toml = format!("{}\n{}", MANAGED, DIRECT.replace("cameras_ping_url", "# "));
        assert!(matches!(
            WatchdogConfig::from_toml_str(&toml),
            Err(ConfigError::Conflict { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let toml = format!("{}\n[notify]\nmax_attempts = 0\n", MANAGED);
        match WatchdogConfig::from_toml_str(&toml) {
            Err(err) => assert_eq!(err.key(), Some("notify.max_attempts")),
            Ok(_) => panic!("zero attempts must be rejected"),
        }
    }

    #[test]
    fn test_credential_override() {
        let toml = format!(
            "credential_service = \"bi-prod\"\ncredential_account = \"watchdog\"\n{}",
            MANAGED
        );
        let config = WatchdogConfig::from_toml_str(&toml).unwrap();
        let ProbeStrategy::ManagedApi(managed) = config.strategy else {
            panic!("expected managed strategy");
        };
        assert_eq!(managed.credential.service, "bi-prod");
        assert_eq!(managed.credential.account, "watchdog");
        assert_eq!(managed.user, "admin");
    }

    #[test]
    fn test_default_template_is_valid() {
        let config = WatchdogConfig::from_toml_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.strategy_name(), "blueiris");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(DIRECT.as_bytes()).unwrap();

        let config = WatchdogConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.strategy_name(), "direct");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = WatchdogConfig::load_from_file(dir.path().join("camping.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }
}
