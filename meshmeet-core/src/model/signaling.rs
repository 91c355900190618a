use crate::model::fault::ProtocolFault;
use crate::model::negotiation::NegotiationMessage;
use crate::model::participant::{Identity, ParticipantList, SessionId};
use crate::model::room::RoomInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Correlates an acknowledge with the request it answers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RequestId(pub u64);

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageRequest {
    pub target_session_id: SessionId,
    pub message: NegotiationMessage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub room_name: String,
    pub message: serde_json::Value,
}

/// Client to server RPC body.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum SignalRequest {
    BindIdentity(Identity),
    CreateRoom(CreateRoomRequest),
    BeginJoinRoom(JoinRoomRequest),
    CompleteJoinRoom(String),
    LeaveRoom(String),
    CloseRoom(String),
    SendMessage(DirectMessageRequest),
    BroadcastMessage(BroadcastRequest),
}

impl SignalRequest {
    pub fn op(&self) -> &'static str {
        match self {
            Self::BindIdentity(_) => "bind-identity",
            Self::CreateRoom(_) => "create-room",
            Self::BeginJoinRoom(_) => "begin-join-room",
            Self::CompleteJoinRoom(_) => "complete-join-room",
            Self::LeaveRoom(_) => "leave-room",
            Self::CloseRoom(_) => "close-room",
            Self::SendMessage(_) => "send-message",
            Self::BroadcastMessage(_) => "broadcast-message",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct RequestFrame {
    pub id: RequestId,
    pub request: SignalRequest,
}

/// Server to client frame.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// `payload` is the JSON-encoded acknowledge body.
    Ack { id: RequestId, payload: String },
    Reject { id: RequestId, fault: ProtocolFault },
    Event { event: SignalEvent },
}

impl ServerFrame {
    pub fn ack<T: Serialize>(id: RequestId, body: &T) -> serde_json::Result<Self> {
        Ok(Self::Ack {
            id,
            payload: serde_json::to_string(body)?,
        })
    }
}

/// Push event. Payloads are JSON-encoded strings, decoded by the receiver.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(tag = "name", content = "payload", rename_all = "kebab-case")]
pub enum SignalEvent {
    OtherJoin(String),
    OtherLeave(String),
    RoomClosed(String),
    ReceiveMessage(String),
}

impl SignalEvent {
    pub fn other_join(body: &PeerJoined) -> serde_json::Result<Self> {
        serde_json::to_string(body).map(Self::OtherJoin)
    }

    pub fn other_leave(body: &PeerLeft) -> serde_json::Result<Self> {
        serde_json::to_string(body).map(Self::OtherLeave)
    }

    pub fn room_closed(room_name: &str) -> serde_json::Result<Self> {
        serde_json::to_string(room_name).map(Self::RoomClosed)
    }

    pub fn receive_message(body: &MessageReceived) -> serde_json::Result<Self> {
        serde_json::to_string(body).map(Self::ReceiveMessage)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OtherJoin(_) => "other-join",
            Self::OtherLeave(_) => "other-leave",
            Self::RoomClosed(_) => "room-closed",
            Self::ReceiveMessage(_) => "receive-message",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::OtherJoin(p) | Self::OtherLeave(p) | Self::RoomClosed(p) | Self::ReceiveMessage(p) => p,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.payload())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerJoined {
    pub identity: Identity,
    pub session_id: SessionId,
    pub participants: ParticipantList,
    pub room: RoomInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerLeft {
    pub identity: Identity,
    pub session_id: SessionId,
    pub participants: ParticipantList,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(tag = "channel", content = "body", rename_all = "kebab-case")]
pub enum RelayedMessage {
    Direct(NegotiationMessage),
    Broadcast(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceived {
    pub identity: Identity,
    pub session_id: SessionId,
    pub message: RelayedMessage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub identity: Identity,
    pub participants: ParticipantList,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJoinAck {
    pub identity: Identity,
    pub participants: ParticipantList,
    pub room: RoomInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveAck {
    pub identity: Identity,
    pub participants: ParticipantList,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAck {
    pub identity: Identity,
    pub delivered: usize,
}
