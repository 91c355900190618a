use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub struct TransferId(pub Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binary frame carried on the file subchannel.
///
/// A transfer is one `Header` followed by exactly `chunks` `Chunk` frames with
/// consecutive `seq` numbers starting at zero. The subchannel is ordered, so the
/// receiver can reassemble by appending.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub enum FilePacket {
    Header {
        transfer_id: TransferId,
        name: String,
        size: u64,
        chunks: u32,
    },
    Chunk {
        transfer_id: TransferId,
        seq: u32,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
}

impl FilePacket {
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Splits `data` into a header and its chunk frames.
    pub fn split(name: &str, data: &[u8], chunk_size: usize) -> Vec<FilePacket> {
        let transfer_id = TransferId::new();
        let chunk_size = chunk_size.max(1);
        let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();

        let mut packets = Vec::with_capacity(chunks.len() + 1);
        packets.push(FilePacket::Header {
            transfer_id,
            name: name.to_owned(),
            size: data.len() as u64,
            chunks: chunks.len() as u32,
        });
        for (seq, chunk) in chunks.into_iter().enumerate() {
            packets.push(FilePacket::Chunk {
                transfer_id,
                seq: seq as u32,
                data: chunk.to_vec(),
            });
        }
        packets
    }
}
