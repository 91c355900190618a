use crate::room::Room;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshmeet_core::{
    ErrorCode, Identity, ParticipantList, ProtocolFault, RoomInfo, SessionId,
};
use std::sync::Arc;
use tracing::info;

/// Outcome of a membership change: the new list plus whom to notify.
#[derive(Debug)]
pub struct Membership {
    pub participants: ParticipantList,
    pub room: Option<RoomInfo>,
    pub notify: Vec<SessionId>,
}

#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, Room>>,
    default_capacity: usize,
}

impl RoomRegistry {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            default_capacity,
        }
    }

    pub fn create(
        &self,
        name: &str,
        host: Identity,
        host_session: SessionId,
        capacity: Option<usize>,
        password: Option<String>,
    ) -> Result<RoomInfo, ProtocolFault> {
        match self.rooms.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ProtocolFault::new(
                ErrorCode::RoomAlreadyExists,
                format!("room '{name}' already exists"),
            )),
            Entry::Vacant(slot) => {
                info!("Creating room '{}' hosted by {}", name, host);
                let capacity = capacity.unwrap_or(self.default_capacity);
                let room = Room::new(name, host, host_session, capacity, password);
                let info = room.info();
                slot.insert(room);
                Ok(info)
            }
        }
    }

    pub fn begin_join(
        &self,
        name: &str,
        identity: Identity,
        session_id: SessionId,
        password: &str,
    ) -> Result<ParticipantList, ProtocolFault> {
        let mut room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| ProtocolFault::room_not_found(name))?;
        room.admit(identity, session_id, password)
    }

    pub fn complete_join(&self, name: &str, identity: &Identity) -> Result<Membership, ProtocolFault> {
        let room = self
            .rooms
            .get(name)
            .ok_or_else(|| ProtocolFault::room_not_found(name))?;
        if room.get(identity).is_none() {
            return Err(not_in_room(name));
        }
        Ok(Membership {
            participants: room.participants().clone(),
            room: Some(room.info()),
            notify: room.others(identity),
        })
    }

    /// Removes `identity`, destroying the room once nobody is left.
    pub fn leave(&self, name: &str, identity: &Identity) -> Result<Membership, ProtocolFault> {
        let membership = {
            let mut room = self
                .rooms
                .get_mut(name)
                .ok_or_else(|| ProtocolFault::room_not_found(name))?;
            if room.remove(identity).is_none() {
                return Err(not_in_room(name));
            }
            Membership {
                participants: room.participants().clone(),
                room: Some(room.info()),
                notify: room.others(identity),
            }
        };

        if self.rooms.remove_if(name, |_, room| room.is_empty()).is_some() {
            info!("Room '{}' is empty and was destroyed", name);
        }
        Ok(membership)
    }

    /// Host-only. Destroys the room and returns everyone who must be told.
    pub fn close(&self, name: &str, identity: &Identity) -> Result<Membership, ProtocolFault> {
        {
            let room = self
                .rooms
                .get(name)
                .ok_or_else(|| ProtocolFault::room_not_found(name))?;
            if room.host() != identity {
                return Err(ProtocolFault::new(
                    ErrorCode::NotHost,
                    format!("only {} may close room '{name}'", room.host()),
                ));
            }
        }

        let (_, room) = self
            .rooms
            .remove(name)
            .ok_or_else(|| ProtocolFault::room_not_found(name))?;
        info!("Room '{}' closed by host {}", name, identity);
        Ok(Membership {
            participants: room.participants().clone(),
            room: Some(room.info()),
            notify: room.others(identity),
        })
    }

    pub fn info(&self, name: &str) -> Option<RoomInfo> {
        self.rooms.get(name).map(|room| room.info())
    }

    /// Session currently registered for `identity` in room `name`.
    pub fn session_of(&self, name: &str, identity: &Identity) -> Option<SessionId> {
        let room = self.rooms.get(name)?;
        room.get(identity).map(|p| p.session_id.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn not_in_room(name: &str) -> ProtocolFault {
    ProtocolFault::new(ErrorCode::NotInRoom, format!("not a participant of room '{name}'"))
}
