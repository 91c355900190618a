use crate::config::ServerConfig;
use crate::room::{Membership, RoomRegistry};
use dashmap::DashMap;
use meshmeet_core::{
    CompleteJoinAck, DeliveryAck, ErrorCode, Identity, JoinAck, LeaveAck, MessageReceived,
    PeerJoined, PeerLeft, ProtocolFault, RelayedMessage, RequestFrame, RequestId, ServerFrame,
    SessionId, SignalEvent, SignalRequest,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct SessionEntry {
    tx: mpsc::UnboundedSender<String>,
    identity: Option<Identity>,
    room: Option<String>,
}

struct SignalingInner {
    sessions: DashMap<SessionId, SessionEntry>,
    rooms: RoomRegistry,
}

/// RPC dispatcher and event fan-out of the relay.
///
/// Transport agnostic: every session is an outbound `String` queue plus
/// whatever feeds [`handle_text`](Self::handle_text).
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}

impl SignalingService {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                rooms: RoomRegistry::new(config.default_capacity),
            }),
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.inner.rooms
    }

    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> SessionId {
        let session_id = SessionId::new();
        self.inner.sessions.insert(
            session_id.clone(),
            SessionEntry {
                tx,
                identity: None,
                room: None,
            },
        );
        debug!("Session {} registered", session_id);
        session_id
    }

    /// Drops the session. A session still inside a room leaves it.
    pub fn unregister(&self, session_id: &SessionId) {
        let Some((_, entry)) = self.inner.sessions.remove(session_id) else {
            return;
        };
        debug!("Session {} unregistered", session_id);

        let (Some(identity), Some(room)) = (entry.identity, entry.room) else {
            return;
        };
        // A reconnect may already have moved the identity to a newer session.
        if self.inner.rooms.session_of(&room, &identity).as_ref() != Some(session_id) {
            return;
        }

        info!("{} dropped its transport, leaving '{}'", identity, room);
        match self.inner.rooms.leave(&room, &identity) {
            Ok(membership) => self.notify_left(&identity, session_id, membership),
            Err(fault) => warn!("Implicit leave of '{}' failed: {}", room, fault),
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Decodes one inbound frame, runs it, and queues the ack or reject.
    pub fn handle_text(&self, session_id: &SessionId, text: &str) {
        let frame = match serde_json::from_str::<RequestFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Malformed frame from {}: {}", session_id, e);
                let id = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_u64()))
                    .unwrap_or_default();
                let fault = ProtocolFault::new(ErrorCode::MalformedRequest, e.to_string());
                self.send_frame(session_id, &ServerFrame::Reject { id: RequestId(id), fault });
                return;
            }
        };

        debug!("{} -> {}", session_id, frame.request.op());
        let reply = match self.dispatch(session_id, frame.request) {
            Ok(payload) => ServerFrame::Ack {
                id: frame.id,
                payload,
            },
            Err(fault) => {
                debug!("Rejecting request {} of {}: {}", frame.id.0, session_id, fault);
                ServerFrame::Reject { id: frame.id, fault }
            }
        };
        self.send_frame(session_id, &reply);
    }

    fn dispatch(&self, session_id: &SessionId, request: SignalRequest) -> Result<String, ProtocolFault> {
        if let SignalRequest::BindIdentity(identity) = request {
            return self.bind(session_id, identity);
        }

        let identity = self.identity_of(session_id).ok_or_else(ProtocolFault::not_bound)?;
        let rooms = &self.inner.rooms;

        match request {
            SignalRequest::BindIdentity(identity) => self.bind(session_id, identity),

            SignalRequest::CreateRoom(req) => {
                let info = rooms.create(
                    &req.room_name,
                    identity,
                    session_id.clone(),
                    req.capacity,
                    req.password,
                )?;
                self.set_room(session_id, Some(req.room_name));
                encode(&info.participants)
            }

            SignalRequest::BeginJoinRoom(req) => {
                let participants =
                    rooms.begin_join(&req.room_name, identity.clone(), session_id.clone(), &req.password)?;
                self.set_room(session_id, Some(req.room_name));
                encode(&JoinAck {
                    identity,
                    participants,
                })
            }

            SignalRequest::CompleteJoinRoom(name) => {
                let membership = rooms.complete_join(&name, &identity)?;
                let room = membership.room.ok_or_else(|| internal("room snapshot missing"))?;
                let joined = PeerJoined {
                    identity: identity.clone(),
                    session_id: session_id.clone(),
                    participants: membership.participants.clone(),
                    room: room.clone(),
                };
                self.emit_all(&membership.notify, SignalEvent::other_join(&joined));
                encode(&CompleteJoinAck {
                    identity,
                    participants: membership.participants,
                    room,
                })
            }

            SignalRequest::LeaveRoom(name) => {
                let membership = rooms.leave(&name, &identity)?;
                self.set_room(session_id, None);
                let participants = membership.participants.clone();
                self.notify_left(&identity, session_id, membership);
                encode(&LeaveAck {
                    identity,
                    participants,
                })
            }

            SignalRequest::CloseRoom(name) => {
                let membership = rooms.close(&name, &identity)?;
                self.set_room(session_id, None);
                for other in &membership.notify {
                    self.set_room(other, None);
                }
                self.emit_all(&membership.notify, SignalEvent::room_closed(&name));
                encode(&membership.room)
            }

            SignalRequest::SendMessage(req) => {
                if !self.inner.sessions.contains_key(&req.target_session_id) {
                    return Err(ProtocolFault::new(
                        ErrorCode::PeerNotFound,
                        format!("no session {}", req.target_session_id),
                    ));
                }
                debug!(
                    "Relaying {} from {} to {}",
                    req.message.kind(),
                    identity,
                    req.target_session_id
                );
                let body = MessageReceived {
                    identity: identity.clone(),
                    session_id: session_id.clone(),
                    message: RelayedMessage::Direct(req.message),
                };
                self.emit(&req.target_session_id, SignalEvent::receive_message(&body));
                encode(&DeliveryAck {
                    identity,
                    delivered: 1,
                })
            }

            SignalRequest::BroadcastMessage(req) => {
                let Some(info) = rooms.info(&req.room_name) else {
                    return Err(ProtocolFault::room_not_found(&req.room_name));
                };
                if !info.participants.iter().any(|p| p.identity == identity) {
                    return Err(ProtocolFault::new(
                        ErrorCode::NotInRoom,
                        format!("not a participant of room '{}'", req.room_name),
                    ));
                }
                let targets: Vec<SessionId> = info
                    .participants
                    .iter()
                    .filter(|p| p.identity != identity)
                    .map(|p| p.session_id.clone())
                    .collect();
                let body = MessageReceived {
                    identity: identity.clone(),
                    session_id: session_id.clone(),
                    message: RelayedMessage::Broadcast(req.message),
                };
                self.emit_all(&targets, SignalEvent::receive_message(&body));
                encode(&DeliveryAck {
                    identity,
                    delivered: targets.len(),
                })
            }
        }
    }

    fn bind(&self, session_id: &SessionId, identity: Identity) -> Result<String, ProtocolFault> {
        let mut entry = self
            .inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| internal("session vanished"))?;
        info!("Session {} bound to {}", session_id, identity);
        entry.identity = Some(identity.clone());
        drop(entry);
        encode(&identity)
    }

    fn notify_left(&self, identity: &Identity, session_id: &SessionId, membership: Membership) {
        let left = PeerLeft {
            identity: identity.clone(),
            session_id: session_id.clone(),
            participants: membership.participants,
        };
        self.emit_all(&membership.notify, SignalEvent::other_leave(&left));
    }

    fn identity_of(&self, session_id: &SessionId) -> Option<Identity> {
        self.inner
            .sessions
            .get(session_id)
            .and_then(|entry| entry.identity.clone())
    }

    fn set_room(&self, session_id: &SessionId, room: Option<String>) {
        if let Some(mut entry) = self.inner.sessions.get_mut(session_id) {
            entry.room = room;
        }
    }

    fn emit(&self, target: &SessionId, event: serde_json::Result<SignalEvent>) {
        match event {
            Ok(event) => self.send_frame(target, &ServerFrame::Event { event }),
            Err(e) => error!("Failed to encode event: {}", e),
        }
    }

    fn emit_all(&self, targets: &[SessionId], event: serde_json::Result<SignalEvent>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to encode event: {}", e);
                return;
            }
        };
        for target in targets {
            self.send_frame(target, &ServerFrame::Event { event: event.clone() });
        }
    }

    pub fn send_frame(&self, session_id: &SessionId, frame: &ServerFrame) {
        let Some(entry) = self.inner.sessions.get(session_id) else {
            warn!("Attempted to send to disconnected session {}", session_id);
            return;
        };
        match serde_json::to_string(frame) {
            Ok(json) => {
                if let Err(e) = entry.tx.send(json) {
                    error!("Failed to queue frame for {}: {:?}", session_id, e);
                }
            }
            Err(e) => error!("Failed to serialize server frame: {}", e),
        }
    }
}

fn encode<T: Serialize>(body: &T) -> Result<String, ProtocolFault> {
    serde_json::to_string(body).map_err(|e| internal(e.to_string()))
}

fn internal(message: impl Into<String>) -> ProtocolFault {
    ProtocolFault::new(ErrorCode::Internal, message)
}
