use crate::error::ConfigError;
use crate::media::{MediaConstraints, RecorderOptions};
use crate::peer::OfferOptions;
use meshmeet_core::IceServerConfig;
use meshmeet_core::utils::{
    DEFAULT_FILE_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2,
    DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Static client configuration. ICE servers are supplied here and never negotiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub signaling_url: String,
    pub rpc_timeout_ms: u64,
    pub ice_servers: Vec<IceServerConfig>,
    pub media: MediaConstraints,
    pub screen: MediaConstraints,
    pub offer: OfferOptions,
    pub file_chunk_size: usize,
    /// Incoming transfers announcing more than this are ignored.
    pub max_file_size: u64,
    pub recording: RecorderOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:3000/ws".to_string(),
            rpc_timeout_ms: 10_000,
            ice_servers: vec![IceServerConfig {
                urls: vec![
                    DEFAULT_STUN_ADDR.to_owned(),
                    DEFAULT_STUN_ADDR_2.to_owned(),
                    DEFAULT_STUN_ADDR_3.to_owned(),
                    DEFAULT_STUN_ADDR_4.to_owned(),
                ],
                username: None,
                credential: None,
            }],
            media: MediaConstraints::default(),
            screen: MediaConstraints::screen(),
            offer: OfferOptions::default(),
            file_chunk_size: DEFAULT_FILE_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            recording: RecorderOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Same config with capture disabled, for receive-only participants.
    pub fn without_media(mut self) -> Self {
        self.media = MediaConstraints::none();
        self
    }
}
