use meshmeet_core::{
    ErrorCode, Identity, Participant, ParticipantList, ProtocolFault, Role, RoomInfo, SessionId,
};
use tracing::info;

/// Relay-side state of one room. Owned by the [`RoomRegistry`](crate::RoomRegistry).
#[derive(Debug)]
pub struct Room {
    name: String,
    password: Option<String>,
    capacity: usize,
    host: Identity,
    participants: ParticipantList,
}

impl Room {
    pub fn new(
        name: impl Into<String>,
        host: Identity,
        host_session: SessionId,
        capacity: usize,
        password: Option<String>,
    ) -> Self {
        let host_participant = Participant::new(host.clone(), host_session, Role::Host);
        Self {
            name: name.into(),
            password: password.filter(|p| !p.is_empty()),
            capacity: capacity.max(1),
            host,
            participants: vec![host_participant],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &Identity {
        &self.host
    }

    pub fn participants(&self) -> &ParticipantList {
        &self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, identity: &Identity) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.identity == identity)
    }

    /// Admits `identity` after checking the password, then the capacity.
    ///
    /// An identity that is already present is a reconnect: its session id is
    /// replaced and no extra seat is consumed.
    pub fn admit(
        &mut self,
        identity: Identity,
        session_id: SessionId,
        password: &str,
    ) -> Result<ParticipantList, ProtocolFault> {
        if let Some(expected) = &self.password
            && expected != password
        {
            return Err(ProtocolFault::new(
                ErrorCode::InvalidPassword,
                format!("wrong password for room '{}'", self.name),
            ));
        }

        if let Some(existing) = self.participants.iter_mut().find(|p| p.identity == identity) {
            existing.session_id = session_id;
            return Ok(self.participants.clone());
        }

        if self.participants.len() >= self.capacity {
            return Err(ProtocolFault::new(
                ErrorCode::RoomFull,
                format!("room '{}' is full ({} participants)", self.name, self.capacity),
            ));
        }

        let role = if identity == self.host {
            Role::Host
        } else {
            Role::Attendee
        };
        self.participants.push(Participant::new(identity, session_id, role));
        Ok(self.participants.clone())
    }

    /// Removes `identity`. A departing host hands the room to the longest-seated participant.
    pub fn remove(&mut self, identity: &Identity) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| &p.identity == identity)?;
        let removed = self.participants.remove(idx);

        if &self.host == identity
            && let Some(successor) = self.participants.first_mut()
        {
            successor.role = Role::Host;
            self.host = successor.identity.clone();
            info!("{} left room '{}', {} is now host", identity, self.name, self.host);
        }
        Some(removed)
    }

    /// Session ids of everyone in the room except `identity`.
    pub fn others(&self, identity: &Identity) -> Vec<SessionId> {
        self.participants
            .iter()
            .filter(|p| &p.identity != identity)
            .map(|p| p.session_id.clone())
            .collect()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            name: self.name.clone(),
            host: self.host.clone(),
            capacity: self.capacity,
            has_password: self.password.is_some(),
            participants: self.participants.clone(),
        }
    }
}
