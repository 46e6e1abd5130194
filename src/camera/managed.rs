use super::prober::CameraProber;
use super::status::{CameraStatus, ManagedCamera, ProbeOutcome};
use crate::error::{ApiError, ProbeCameraError, ProbeSessionError};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Identity returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub system_name: String,
    pub version: String,
}

impl SessionInfo {
    /// Blue Iris answers some failed logins with a placeholder identity
    pub fn is_anonymous(&self) -> bool {
        let placeholder = |value: &str| value.is_empty() || value.eq_ignore_ascii_case("noname");
        placeholder(&self.version) || placeholder(&self.system_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraFlags {
    pub enabled: bool,
    pub online: bool,
    pub no_signal: bool,
}

/// One entry of the camera list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraListing {
    pub short_name: String,
    pub display_name: String,
    pub flags: CameraFlags,
}

impl CameraListing {
    /// Group views such as `@Index` are listed alongside cameras but are not cameras
    pub fn is_group(&self) -> bool {
        self.short_name.starts_with('@')
    }
}

/// Session-oriented video-management API: login, enumerate, describe
#[async_trait]
pub trait VideoManagementApi: Send {
    async fn login(&mut self) -> Result<SessionInfo, ApiError>;

    async fn list_cameras(&mut self) -> Result<Vec<CameraListing>, ApiError>;

    async fn describe_camera(&mut self, camera: &CameraListing) -> Result<CameraFlags, ApiError>;

    async fn logout(&mut self) -> Result<(), ApiError>;
}

/// Managed prober lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Enumerating,
    Describing(usize),
    Done,
    Failed,
}

/// Probes cameras through an authenticated video-management session
pub struct ManagedApiProber<A> {
    api: A,
    state: ProbeState,
}

impl<A: VideoManagementApi> ManagedApiProber<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: ProbeState::Unauthenticated,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn into_inner(self) -> A {
        self.api
    }

    fn set_state(&mut self, state: ProbeState) {
        debug!("Managed prober state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn fail(&mut self, error: ProbeSessionError) -> ProbeOutcome {
        self.set_state(ProbeState::Failed);
        Err(error)
    }

    async fn authenticate(&mut self) -> Result<SessionInfo, ProbeSessionError> {
        self.set_state(ProbeState::Authenticating);

        match self.api.login().await {
            Ok(session) if session.is_anonymous() => {
                warn!("Login returned an anonymous session");
                Err(ProbeSessionError::LoginRejected)
            }
            Ok(session) => Ok(session),
            Err(ApiError::Rejected { reason }) => {
                warn!("Login rejected: {}", reason);
                Err(ProbeSessionError::LoginRejected)
            }
            Err(e) => Err(ProbeSessionError::Unreachable {
                reason: e.to_string(),
            }),
        }
    }

    async fn enumerate(&mut self) -> ProbeOutcome {
        self.set_state(ProbeState::Enumerating);

        let listings = match self.api.list_cameras().await {
            Ok(listings) => listings,
            Err(e) => {
                return self.fail(ProbeSessionError::Enumeration {
                    reason: e.to_string(),
                })
            }
        };

        let cameras: Vec<CameraListing> =
            listings.into_iter().filter(|c| !c.is_group()).collect();
        debug!("Camera list has {} camera(s)", cameras.len());

        let mut statuses = Vec::with_capacity(cameras.len());
        for (index, listing) in cameras.into_iter().enumerate() {
            self.set_state(ProbeState::Describing(index));

            let camera = match self.api.describe_camera(&listing).await {
                Ok(flags) => ManagedCamera {
                    display_name: listing.display_name,
                    short_name: listing.short_name,
                    enabled: flags.enabled,
                    online: flags.online,
                    no_signal: flags.no_signal,
                    error: None,
                },
                Err(e) => {
                    let error = ProbeCameraError::Describe {
                        camera: listing.short_name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", error);
                    ManagedCamera::undetermined(listing.display_name, listing.short_name, error)
                }
            };

            let status = CameraStatus::from(camera);
            if status.is_up() {
                info!("{} is UP.", status.label());
            } else {
                info!("{} is DOWN.", status.label());
            }
            statuses.push(status);
        }

        self.set_state(ProbeState::Done);
        Ok(statuses)
    }
}

#[async_trait]
impl<A: VideoManagementApi> CameraProber for ManagedApiProber<A> {
    async fn probe(&mut self) -> ProbeOutcome {
        let session = match self.authenticate().await {
            Ok(session) => session,
            Err(e) => return self.fail(e),
        };
        self.set_state(ProbeState::Authenticated);
        info!("Blue Iris Version {} {}.", session.version, session.system_name);

        info!("Updating camera list ...");
        let outcome = self.enumerate().await;

        if let Err(e) = self.api.logout().await {
            debug!("Logout failed: {}", e);
        }

        outcome
    }

    fn strategy(&self) -> &'static str {
        "blueiris"
    }
}
