use crate::media::{StreamSource, TrackKind};
use crate::peer::ChannelLabel;
use meshmeet_core::{ErrorCode, Identity, ProtocolFault};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling transport disconnected")]
    TransportDisconnected,

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("request '{op}' timed out")]
    Timeout { op: &'static str },

    #[error("request rejected: {0}")]
    Rejected(ProtocolFault),

    #[error("malformed signaling payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SignalingError {
    /// Machine-readable code when the relay refused the request.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected(fault) => Some(fault.code),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to capture {0} media was denied")]
    PermissionDenied(StreamSource),

    #[error("no {0} capture device available")]
    DeviceUnavailable(TrackKind),

    #[error("constraints request neither audio nor video")]
    NoTracksRequested,

    #[error("no {0} stream has been acquired")]
    NotAcquired(StreamSource),

    #[error("recorder stopped abnormally: {0}")]
    RecorderFailed(String),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("{0} channel is not open")]
    ChannelNotOpen(ChannelLabel),

    #[error("peer link is closed")]
    Closed,

    #[error("session description error: {0}")]
    Sdp(String),

    #[error("ice candidate error: {0}")]
    Candidate(String),

    #[error("media transport error: {0}")]
    Transport(String),

    #[error("failed to relay negotiation: {0}")]
    Relay(#[from] SignalingError),

    #[error("bad file packet: {0}")]
    Packet(#[from] postcard::Error),
}

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("not in a room")]
    NotInRoom,

    #[error("no participant named {0}")]
    UnknownPeer(Identity),

    #[error("{0} has no media to record")]
    NothingToRecord(Identity),

    #[error("{0} is not being recorded")]
    NotRecording(Identity),

    #[error("mesh session has ended")]
    SessionEnded,
}

impl MeshError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Signaling(e) => e.code(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
