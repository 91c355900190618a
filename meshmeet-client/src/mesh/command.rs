use crate::error::MeshError;
use crate::media::{Recording, TrackKind};
use crate::mesh::BroadcastReport;
use crate::peer::PeerState;
use bytes::Bytes;
use meshmeet_core::{Identity, ParticipantList, RoomInfo, RoomOptions};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, MeshError>>;

/// Requests from the application shell to the coordinator task.
pub(crate) enum MeshCommand {
    CreateRoom {
        name: String,
        options: RoomOptions,
        reply: Reply<ParticipantList>,
    },
    JoinRoom {
        name: String,
        password: String,
        reply: Reply<RoomInfo>,
    },
    LeaveRoom {
        reply: Reply<()>,
    },
    CloseRoom {
        reply: Reply<()>,
    },
    SendText {
        text: String,
        reply: Reply<BroadcastReport>,
    },
    SendFile {
        name: String,
        data: Bytes,
        reply: Reply<BroadcastReport>,
    },
    ShareScreen {
        reply: Reply<()>,
    },
    StopScreenShare {
        reply: Reply<()>,
    },
    ToggleTrack {
        kind: TrackKind,
        reply: Reply<Option<bool>>,
    },
    Renegotiate {
        identity: Identity,
        reply: Reply<()>,
    },
    BroadcastSignal {
        payload: serde_json::Value,
        reply: Reply<usize>,
    },
    StartRecording {
        identity: Identity,
        reply: Reply<()>,
    },
    StopRecording {
        identity: Identity,
        reply: Reply<Recording>,
    },
    PeerStates {
        reply: Reply<BTreeMap<Identity, PeerState>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Cloneable front door to a running coordinator.
///
/// Every call fails with [`MeshError::SessionEnded`] once the coordinator task is gone.
#[derive(Clone)]
pub struct MeshHandle {
    tx: mpsc::Sender<MeshCommand>,
}

impl MeshHandle {
    pub(crate) fn new(tx: mpsc::Sender<MeshCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> MeshCommand,
    ) -> Result<T, MeshError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| MeshError::SessionEnded)?;
        rx.await.map_err(|_| MeshError::SessionEnded)?
    }

    /// Hosts a new room with default options.
    pub async fn create_room(&self, name: &str) -> Result<ParticipantList, MeshError> {
        self.create_room_with(name, RoomOptions::default()).await
    }

    pub async fn create_room_with(
        &self,
        name: &str,
        options: RoomOptions,
    ) -> Result<ParticipantList, MeshError> {
        let name = name.to_string();
        self.request(|reply| MeshCommand::CreateRoom {
            name,
            options,
            reply,
        })
        .await
    }

    /// Runs both join phases with local media acquired in between.
    pub async fn join_room(&self, name: &str, password: &str) -> Result<RoomInfo, MeshError> {
        let (name, password) = (name.to_string(), password.to_string());
        self.request(|reply| MeshCommand::JoinRoom {
            name,
            password,
            reply,
        })
        .await
    }

    pub async fn leave_room(&self) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::LeaveRoom { reply }).await
    }

    /// Host only.
    pub async fn close_room(&self) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::CloseRoom { reply }).await
    }

    pub async fn send_text(&self, text: &str) -> Result<BroadcastReport, MeshError> {
        let text = text.to_string();
        self.request(|reply| MeshCommand::SendText { text, reply })
            .await
    }

    pub async fn send_file(
        &self,
        name: &str,
        data: impl Into<Bytes>,
    ) -> Result<BroadcastReport, MeshError> {
        let (name, data) = (name.to_string(), data.into());
        self.request(|reply| MeshCommand::SendFile { name, data, reply })
            .await
    }

    pub async fn share_screen(&self) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::ShareScreen { reply })
            .await
    }

    pub async fn stop_screen_share(&self) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::StopScreenShare { reply })
            .await
    }

    /// Mutes or unmutes every `kind` track of the published stream.
    pub async fn toggle_track(&self, kind: TrackKind) -> Result<Option<bool>, MeshError> {
        self.request(|reply| MeshCommand::ToggleTrack { kind, reply })
            .await
    }

    /// Drops the link to `identity` and offers again on a fresh one.
    pub async fn renegotiate(&self, identity: &Identity) -> Result<(), MeshError> {
        let identity = identity.clone();
        self.request(|reply| MeshCommand::Renegotiate { identity, reply })
            .await
    }

    /// Sends arbitrary JSON to the room through the relay. Returns the number of recipients.
    pub async fn broadcast_signal(&self, payload: serde_json::Value) -> Result<usize, MeshError> {
        self.request(|reply| MeshCommand::BroadcastSignal { payload, reply })
            .await
    }

    /// Records the stream of `identity`, or the active local stream for our own identity.
    ///
    /// Starting a recording that already runs does nothing.
    pub async fn start_recording(&self, identity: &Identity) -> Result<(), MeshError> {
        let identity = identity.clone();
        self.request(|reply| MeshCommand::StartRecording { identity, reply })
            .await
    }

    pub async fn stop_recording(&self, identity: &Identity) -> Result<Recording, MeshError> {
        let identity = identity.clone();
        self.request(|reply| MeshCommand::StopRecording { identity, reply })
            .await
    }

    pub async fn peer_states(&self) -> Result<BTreeMap<Identity, PeerState>, MeshError> {
        self.request(|reply| MeshCommand::PeerStates { reply })
            .await
    }

    /// Tears the session down without telling the relay first.
    pub async fn shutdown(&self) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::Shutdown { reply }).await
    }
}
