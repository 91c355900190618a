use std::fmt;

/// Lifecycle of a peer link. Only moves forward; `Closed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeerState {
    New,
    Negotiating,
    Connected,
    Closed,
}

impl PeerState {
    pub fn can_advance_to(self, next: PeerState) -> bool {
        self != PeerState::Closed && next > self
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Negotiating => "negotiating",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}
