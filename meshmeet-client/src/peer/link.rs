use crate::error::PeerError;
use crate::media::{MediaTrack, TrackKind};
use async_trait::async_trait;
use bytes::Bytes;
use meshmeet_core::utils::{FILE_CHANNEL_LABEL, TEXT_CHANNEL_LABEL};
use meshmeet_core::{IceCandidate, IceServerConfig, Identity, SessionDescription};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};

/// The two reliable ordered subchannels every link carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLabel {
    Text,
    File,
}

impl ChannelLabel {
    pub const ALL: [ChannelLabel; 2] = [ChannelLabel::Text, ChannelLabel::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => TEXT_CHANNEL_LABEL,
            Self::File => FILE_CHANNEL_LABEL,
        }
    }

    /// Pre-agreed stream id, so both sides open the channel without an
    /// extra round of in-band announcement.
    pub fn negotiated_id(&self) -> u16 {
        match self {
            Self::Text => 0,
            Self::File => 1,
        }
    }
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Connectivity as reported by the media transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPayload {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
    pub ice_restart: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
            ice_restart: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// Encoded frames of one inbound track.
pub type MediaFeed = (TrackKind, broadcast::Receiver<Bytes>);

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    CandidateDiscovered(IceCandidate),
    StateChanged(LinkState),
    TrackReceived(RemoteTrack),
    ChannelOpened(ChannelLabel),
    ChannelMessage(ChannelLabel, ChannelPayload),
    ChannelClosed(ChannelLabel),
}

/// Distinguishes successive links to the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

impl LinkId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct TaggedLinkEvent {
    pub link: LinkId,
    pub identity: Identity,
    pub event: LinkEvent,
}

/// Callback side of a link. Every event is tagged with the link it came from,
/// so events of a replaced link can be told apart and dropped.
#[derive(Debug, Clone)]
pub struct LinkEventSender {
    link: LinkId,
    identity: Identity,
    tx: mpsc::UnboundedSender<TaggedLinkEvent>,
}

impl LinkEventSender {
    pub fn new(identity: Identity, tx: mpsc::UnboundedSender<TaggedLinkEvent>) -> Self {
        Self {
            link: LinkId::next(),
            identity,
            tx,
        }
    }

    pub fn link_id(&self) -> LinkId {
        self.link
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn emit(&self, event: LinkEvent) {
        let _ = self.tx.send(TaggedLinkEvent {
            link: self.link,
            identity: self.identity.clone(),
            event,
        });
    }
}

/// One media-transport connection with its two subchannels.
///
/// Implementations open both subchannels at construction and report
/// everything asynchronous through the [`LinkEventSender`] they were built with.
#[async_trait]
pub trait RtcLink: Send + Sync {
    /// Creates an offer and commits it as the local description.
    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, PeerError>;

    /// Creates an answer to the committed remote offer and commits it locally.
    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        description: SessionDescription,
    ) -> Result<(), PeerError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Replaces the set of outgoing tracks.
    async fn publish(&self, tracks: &[MediaTrack]) -> Result<(), PeerError>;

    async fn send(&self, channel: ChannelLabel, payload: ChannelPayload) -> Result<(), PeerError>;

    /// Subscribes to every track the remote side currently sends.
    async fn inbound_media(&self) -> Vec<MediaFeed>;

    async fn close(&self) -> Result<(), PeerError>;
}

#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn create_link(
        &self,
        remote: &Identity,
        ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Box<dyn RtcLink>, PeerError>;
}
