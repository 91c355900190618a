use crate::model::participant::{Identity, ParticipantList};
use crate::utils::DEFAULT_ROOM_CAPACITY;
use serde::{Deserialize, Serialize};

/// Public view of a room. The password itself never leaves the relay.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub name: String,
    pub host: Identity,
    pub capacity: usize,
    pub has_password: bool,
    pub participants: ParticipantList,
}

impl RoomInfo {
    pub fn identities(&self) -> Vec<&Identity> {
        self.participants.iter().map(|p| &p.identity).collect()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }
}

/// Settings chosen by the room creator.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct RoomOptions {
    pub capacity: usize,
    pub password: Option<String>,
}

impl RoomOptions {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ROOM_CAPACITY,
            password: None,
        }
    }
}
