mod fault;
mod negotiation;
mod packet;
mod participant;
mod room;
mod signaling;

pub use fault::{ErrorCode, ProtocolFault};
pub use negotiation::{IceCandidate, NegotiationMessage, SessionDescription};
pub use packet::{FilePacket, TransferId};
pub use participant::{Identity, Participant, ParticipantList, Role, SessionId};
pub use room::{RoomInfo, RoomOptions};
pub use signaling::{
    BroadcastRequest, CompleteJoinAck, CreateRoomRequest, DeliveryAck, DirectMessageRequest,
    IceServerConfig, JoinAck, JoinRoomRequest, LeaveAck, MessageReceived, PeerJoined, PeerLeft,
    RelayedMessage, RequestFrame, RequestId, ServerFrame, SignalEvent, SignalRequest,
};
