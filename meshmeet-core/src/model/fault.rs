use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable reason a relay request was refused.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotBound,
    RoomAlreadyExists,
    RoomNotFound,
    RoomFull,
    InvalidPassword,
    NotHost,
    NotInRoom,
    PeerNotFound,
    MalformedRequest,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotBound => "NOT_BOUND",
            Self::RoomAlreadyExists => "ROOM_ALREADY_EXISTS",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::NotHost => "NOT_HOST",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::PeerNotFound => "PEER_NOT_FOUND",
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured rejection, `{"error": CODE, "message": "..."}` on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct ProtocolFault {
    #[serde(rename = "error")]
    pub code: ErrorCode,
    pub message: String,
}

impl ProtocolFault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn room_not_found(room: &str) -> Self {
        Self::new(ErrorCode::RoomNotFound, format!("room '{room}' does not exist"))
    }

    pub fn not_bound() -> Self {
        Self::new(
            ErrorCode::NotBound,
            "bind-identity must precede every other request",
        )
    }
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProtocolFault {}
