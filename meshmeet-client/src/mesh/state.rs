use crate::media::{MediaConstraints, StreamSource};
use crate::peer::{PeerState, RemoteTrack};
use meshmeet_core::{Identity, ParticipantList, RoomInfo};
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    InRoom,
    /// Room left or closed. The session cannot be reused.
    Ended,
    /// Signaling transport dropped. Existing links may still carry media.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: Identity,
    pub text: String,
    pub sent_at: SystemTime,
}

impl ChatMessage {
    pub fn new(from: Identity, text: impl Into<String>) -> Self {
        Self {
            from,
            text: text.into(),
            sent_at: SystemTime::now(),
        }
    }
}

/// Snapshot of one meeting session as the application shell sees it.
///
/// Only the mesh coordinator writes it; everybody else reads published copies.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub phase: SessionPhase,
    pub room: Option<RoomInfo>,
    pub participants: ParticipantList,
    pub remote_streams: BTreeMap<Identity, RemoteTrack>,
    pub messages: Vec<ChatMessage>,
    pub media_constraints: Option<MediaConstraints>,
    pub active_source: Option<StreamSource>,
    pub peers: BTreeMap<Identity, PeerState>,
    /// Participants with a recorder running, the local identity included.
    pub recording: BTreeSet<Identity>,
}

impl SessionState {
    pub fn enter_room(&mut self, room: RoomInfo) {
        self.participants = room.participants.clone();
        self.room = Some(room);
        self.phase = SessionPhase::InRoom;
    }

    /// Replaces the member list. The host follows whoever holds the host role.
    pub fn set_participants(&mut self, participants: ParticipantList) {
        if let Some(room) = self.room.as_mut() {
            if let Some(host) = participants.iter().find(|p| p.is_host()) {
                room.host = host.identity.clone();
            }
            room.participants = participants.clone();
        }
        self.participants = participants;
    }

    /// Drops everything tied to `identity` except chat history.
    pub fn remove_peer(&mut self, identity: &Identity) {
        self.participants.retain(|p| &p.identity != identity);
        if let Some(room) = self.room.as_mut() {
            room.participants.retain(|p| &p.identity != identity);
        }
        self.remote_streams.remove(identity);
        self.peers.remove(identity);
    }

    pub fn record_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn is_participant(&self, identity: &Identity) -> bool {
        self.participants.iter().any(|p| &p.identity == identity)
    }

    /// Back to an empty session. Only the bound identity survives.
    pub fn reset(&mut self, phase: SessionPhase) {
        let identity = self.identity.take();
        *self = Self {
            identity,
            phase,
            ..Default::default()
        };
    }
}
