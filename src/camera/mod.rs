mod blueiris;
mod direct;
mod managed;
mod prober;
mod status;

pub use blueiris::BlueIrisClient;
pub use direct::{probe_address, split_address, DirectProber};
pub use managed::{
    CameraFlags, CameraListing, ManagedApiProber, ProbeState, SessionInfo, VideoManagementApi,
};
pub use prober::CameraProber;
pub use status::{CameraStatus, ManagedCamera, ProbeOutcome, ProbedCamera};
