use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("{0}")]
    Session(#[from] ProbeSessionError),

    #[error("Heartbeat delivery failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl WatchdogError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Missing or invalid settings. Raised before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration file not found: \"{path}\"")]
    NotFound { path: String },

    #[error("\"{key}\" not found in configuration")]
    Missing { key: String },

    #[error("invalid value for \"{key}\": {reason}")]
    Invalid { key: String, reason: String },

    #[error("\"{first}\" and \"{second}\" are mutually exclusive")]
    Conflict { first: String, second: String },
}

impl ConfigError {
    pub fn missing<S: Into<String>>(key: S) -> Self {
        Self::Missing { key: key.into() }
    }

    pub fn invalid<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Configuration key the error refers to, when there is one
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Missing { key } | Self::Invalid { key, .. } => Some(key),
            Self::Conflict { first, .. } => Some(first),
            Self::Load(_) | Self::NotFound { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{service} password for \"{account}\" not found in keyring")]
    NotFound { service: String, account: String },

    #[error("credential store failure: {message}")]
    Store { message: String },
}

/// The prober could not establish or use its session. Fails the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeSessionError {
    #[error("Blue Iris DOWN: {reason}.")]
    Unreachable { reason: String },

    #[error("Blue Iris login failed.")]
    LoginRejected,

    #[error("Blue Iris DOWN: camera list unavailable: {reason}.")]
    Enumeration { reason: String },
}

/// A single camera's status could not be determined. The camera is recorded down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeCameraError {
    #[error("failed to describe camera {camera}: {reason}")]
    Describe { camera: String, reason: String },

    #[error("invalid address \"{address}\": {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{address} unreachable after {attempts} attempt(s)")]
    Unreachable { address: String, attempts: u32 },
}

/// Failure of a single video-management API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{reason}")]
    Transport { reason: String },

    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    #[error("unexpected response: {reason}")]
    Protocol { reason: String },
}

impl ApiError {
    pub fn transport<S: Into<String>>(reason: S) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn protocol<S: Into<String>>(reason: S) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{url}: {reason} (after {attempts} attempt(s))")]
    Transport {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("{url}: HTTP {status} (after {attempts} attempt(s))")]
    Status {
        url: String,
        attempts: u32,
        status: u16,
    },

    #[error("{url}: timed out after {timeout:?} (after {attempts} attempt(s))")]
    Timeout {
        url: String,
        attempts: u32,
        timeout: Duration,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl NotifyError {
    /// Number of delivery attempts that were made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transport { attempts, .. }
            | Self::Status { attempts, .. }
            | Self::Timeout { attempts, .. } => *attempts,
            Self::Client(_) => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchdogError>;
