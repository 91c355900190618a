use crate::error::{MediaError, PeerError};
use crate::media::Recording;
use crate::mesh::ChatMessage;
use crate::peer::{ReceivedFile, RemoteTrack};
use meshmeet_core::Identity;

/// Notifications for the application shell, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    PeerJoined(Identity),
    PeerConnected(Identity),
    RemoteStream { identity: Identity, track: RemoteTrack },
    TextMessage(ChatMessage),
    FileReceived(ReceivedFile),
    PeerLeft(Identity),
    RoomClosed(String),
    Broadcast {
        from: Identity,
        payload: serde_json::Value,
    },
    /// A recorder was stopped, by request or because its participant went away.
    RecordingFinished(Recording),
    /// Local capture failed. The session continues receive-only.
    MediaUnavailable(MediaError),
    SignalingLost,
}

/// Outcome of a send to every peer. One peer failing never stops the others.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<Identity>,
    pub failed: Vec<(Identity, PeerError)>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
