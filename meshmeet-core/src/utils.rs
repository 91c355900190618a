//! Shared constants.

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

/// Label of the ordered text subchannel.
pub const TEXT_CHANNEL_LABEL: &str = "text-channel";

/// Label of the ordered binary subchannel used for file transfer.
pub const FILE_CHANNEL_LABEL: &str = "file-channel";

/// Room capacity used when the creator does not pick one.
pub const DEFAULT_ROOM_CAPACITY: usize = 8;

/// Payload bytes per file-channel chunk.
pub const DEFAULT_FILE_CHUNK_SIZE: usize = 16 * 1024;

/// Largest file a peer may announce on the file subchannel.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;
