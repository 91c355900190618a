//! Peer-to-peer meeting core: signaling client, local media, per-peer links
//! and the mesh coordinator that ties them together.

pub mod config;
pub mod error;
pub mod media;
pub mod mesh;
pub mod peer;
pub mod signaling;

pub use config::ClientConfig;
pub use error::{ConfigError, MediaError, MeshError, PeerError, SignalingError};
pub use mesh::{
    BroadcastReport, ChatMessage, MeshCoordinator, MeshEvent, MeshHandle, MeshSession,
    SessionPhase, SessionState,
};
pub use signaling::{SignalingClient, SignalingConnection, SignalingHandlers};
