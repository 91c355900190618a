use crate::error::PeerError;
use crate::media::{MediaTrack, TrackKind};
use crate::peer::{
    ChannelLabel, ChannelPayload, LinkEvent, LinkEventSender, LinkFactory, LinkId, LinkState,
    MediaFeed, NegotiationRelay, OfferOptions, PeerState, RemoteTrack, RtcLink, SdpKind,
    TaggedLinkEvent,
};
use bytes::Bytes;
use meshmeet_core::{
    FilePacket, IceCandidate, IceServerConfig, Identity, NegotiationMessage, SessionId, TransferId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Something the owner of a link should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerNotice {
    Connected,
    RemoteStream(RemoteTrack),
    Text(String),
    File(ReceivedFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub from: Identity,
    pub name: String,
    pub data: Bytes,
}

struct IncomingFile {
    name: String,
    size: u64,
    chunks: u32,
    next_seq: u32,
    data: Vec<u8>,
}

/// Everything needed to build a [`PeerLink`].
pub struct PeerLinkParams<'a> {
    pub identity: Identity,
    pub session_id: SessionId,
    pub factory: &'a dyn LinkFactory,
    pub ice_servers: &'a [IceServerConfig],
    pub local_tracks: &'a [MediaTrack],
    pub relay: Arc<dyn NegotiationRelay>,
    pub events: mpsc::UnboundedSender<TaggedLinkEvent>,
    pub file_chunk_size: usize,
    pub max_file_size: u64,
}

/// Per-remote-participant connection and its offer/answer/candidate state machine.
pub struct PeerLink {
    identity: Identity,
    session_id: SessionId,
    link_id: LinkId,
    state: PeerState,
    link: Box<dyn RtcLink>,
    relay: Arc<dyn NegotiationRelay>,
    published: Vec<MediaTrack>,
    remote_stream: Option<RemoteTrack>,
    open_channels: HashSet<ChannelLabel>,
    has_remote_description: bool,
    pending_candidates: Vec<IceCandidate>,
    applied_candidates: usize,
    incoming_files: HashMap<TransferId, IncomingFile>,
    file_chunk_size: usize,
    max_file_size: u64,
}

impl PeerLink {
    /// Builds the transport link and attaches the local tracks.
    ///
    /// A track that cannot be attached is logged; the link still comes up
    /// and can receive.
    pub async fn open(params: PeerLinkParams<'_>) -> Result<Self, PeerError> {
        let events = LinkEventSender::new(params.identity.clone(), params.events);
        let link_id = events.link_id();
        let link = params
            .factory
            .create_link(&params.identity, params.ice_servers, events)
            .await?;

        if !params.local_tracks.is_empty()
            && let Err(e) = link.publish(params.local_tracks).await
        {
            warn!("Failed to attach local tracks for {}: {}", params.identity, e);
        }
        debug!("Peer link {:?} opened for {}", link_id, params.identity);

        Ok(Self {
            identity: params.identity,
            session_id: params.session_id,
            link_id,
            state: PeerState::New,
            link,
            relay: params.relay,
            published: params.local_tracks.to_vec(),
            remote_stream: None,
            open_channels: HashSet::new(),
            has_remote_description: false,
            pending_candidates: Vec::new(),
            applied_candidates: 0,
            incoming_files: HashMap::new(),
            file_chunk_size: params.file_chunk_size.max(1),
            max_file_size: params.max_file_size,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn remote_stream(&self) -> Option<&RemoteTrack> {
        self.remote_stream.as_ref()
    }

    pub fn published(&self) -> &[MediaTrack] {
        &self.published
    }

    pub fn applied_candidates(&self) -> usize {
        self.applied_candidates
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn is_channel_open(&self, channel: ChannelLabel) -> bool {
        self.open_channels.contains(&channel)
    }

    /// Points relayed negotiation at a newer transport session of the same peer.
    pub fn retarget(&mut self, session_id: SessionId) {
        if self.session_id != session_id {
            debug!("{} moved to session {}", self.identity, session_id);
            self.session_id = session_id;
        }
    }

    fn advance(&mut self, next: PeerState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        debug!("{}: {} -> {}", self.identity, self.state, next);
        self.state = next;
        true
    }

    /// Offering side. Failures are logged and leave the link as it was.
    pub async fn start_negotiation(&mut self, options: &OfferOptions) {
        if self.state == PeerState::Closed {
            return;
        }
        self.advance(PeerState::Negotiating);

        let offer = match self.link.create_offer(options).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Failed to create offer for {}: {}", self.identity, e);
                return;
            }
        };
        self.send_negotiation(NegotiationMessage::Offer(offer)).await;
    }

    pub async fn handle_negotiation_message(&mut self, message: NegotiationMessage) {
        if self.state == PeerState::Closed {
            debug!("Dropping {} for closed link {}", message.kind(), self.identity);
            return;
        }

        match message {
            NegotiationMessage::Offer(offer) => {
                self.advance(PeerState::Negotiating);
                if let Err(e) = self.link.set_remote_description(SdpKind::Offer, offer).await {
                    warn!("Rejected offer from {}: {}", self.identity, e);
                    return;
                }
                self.remote_description_committed().await;

                match self.link.create_answer().await {
                    Ok(answer) => {
                        self.send_negotiation(NegotiationMessage::Answer(answer))
                            .await
                    }
                    Err(e) => warn!("Failed to answer {}: {}", self.identity, e),
                }
            }

            NegotiationMessage::Answer(answer) => {
                if let Err(e) = self.link.set_remote_description(SdpKind::Answer, answer).await {
                    warn!("Rejected answer from {}: {}", self.identity, e);
                    return;
                }
                self.remote_description_committed().await;
            }

            NegotiationMessage::Candidate(candidate) => {
                if self.has_remote_description {
                    self.apply_candidate(candidate).await;
                } else {
                    debug!("Queueing early candidate from {}", self.identity);
                    self.pending_candidates.push(candidate);
                }
            }
        }
    }

    async fn remote_description_committed(&mut self) {
        self.has_remote_description = true;
        let queued = std::mem::take(&mut self.pending_candidates);
        if !queued.is_empty() {
            debug!("Replaying {} queued candidates for {}", queued.len(), self.identity);
        }
        for candidate in queued {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) {
        match self.link.add_ice_candidate(candidate).await {
            Ok(()) => self.applied_candidates += 1,
            Err(e) => warn!("Failed to add candidate from {}: {}", self.identity, e),
        }
    }

    async fn send_negotiation(&self, message: NegotiationMessage) {
        let kind = message.kind();
        if let Err(e) = self.relay.relay(&self.session_id, message).await {
            warn!("Failed to relay {} to {}: {}", kind, self.identity, e);
        }
    }

    /// Reacts to transport callbacks. Stale events after `close` are ignored.
    pub async fn handle_link_event(&mut self, event: LinkEvent) -> Option<PeerNotice> {
        if self.state == PeerState::Closed {
            return None;
        }

        match event {
            LinkEvent::CandidateDiscovered(candidate) => {
                self.send_negotiation(NegotiationMessage::Candidate(candidate))
                    .await;
                None
            }

            LinkEvent::StateChanged(LinkState::Connected) => {
                if self.advance(PeerState::Connected) {
                    info!("Connected to {}", self.identity);
                    Some(PeerNotice::Connected)
                } else {
                    None
                }
            }

            LinkEvent::StateChanged(LinkState::Failed) => {
                warn!("Media transport to {} failed", self.identity);
                None
            }

            LinkEvent::StateChanged(state) => {
                debug!("Transport to {} is {:?}", self.identity, state);
                None
            }

            LinkEvent::TrackReceived(track) => {
                if track.kind != TrackKind::Video {
                    debug!("Ignoring {} track from {}", track.kind, self.identity);
                    return None;
                }
                self.remote_stream = Some(track.clone());
                Some(PeerNotice::RemoteStream(track))
            }

            LinkEvent::ChannelOpened(channel) => {
                debug!("{} channel to {} open", channel, self.identity);
                self.open_channels.insert(channel);
                None
            }

            LinkEvent::ChannelMessage(ChannelLabel::Text, payload) => match payload {
                ChannelPayload::Text(text) => Some(PeerNotice::Text(text)),
                ChannelPayload::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(PeerNotice::Text(text)),
                    Err(_) => {
                        warn!("Non-utf8 text message from {}", self.identity);
                        None
                    }
                },
            },

            LinkEvent::ChannelMessage(ChannelLabel::File, payload) => {
                let ChannelPayload::Binary(bytes) = payload else {
                    warn!("Text frame on file channel from {}", self.identity);
                    return None;
                };
                match FilePacket::decode(&bytes) {
                    Ok(packet) => self.on_file_packet(packet).map(PeerNotice::File),
                    Err(e) => {
                        warn!("Undecodable file packet from {}: {}", self.identity, e);
                        None
                    }
                }
            }

            LinkEvent::ChannelClosed(channel) => {
                info!("{} channel to {} closed", channel, self.identity);
                self.open_channels.remove(&channel);
                None
            }
        }
    }

    fn on_file_packet(&mut self, packet: FilePacket) -> Option<ReceivedFile> {
        match packet {
            FilePacket::Header {
                transfer_id,
                name,
                size,
                chunks,
            } => {
                if size > self.max_file_size {
                    warn!(
                        "{} announced '{}' at {} bytes, limit is {}, ignoring",
                        self.identity, name, size, self.max_file_size
                    );
                    return None;
                }
                if u64::from(chunks) > size {
                    warn!("{} announced {} chunks for {} bytes", self.identity, chunks, size);
                    return None;
                }
                debug!("{} is sending '{}' ({} bytes)", self.identity, name, size);
                // Grows with received chunks only; the header size is untrusted.
                let incoming = IncomingFile {
                    name,
                    size,
                    chunks,
                    next_seq: 0,
                    data: Vec::new(),
                };
                if chunks == 0 {
                    return self.finish_file(incoming);
                }
                self.incoming_files.insert(transfer_id, incoming);
                None
            }

            FilePacket::Chunk {
                transfer_id,
                seq,
                data,
            } => {
                let Some(incoming) = self.incoming_files.get_mut(&transfer_id) else {
                    warn!("Chunk for unknown transfer {} from {}", transfer_id, self.identity);
                    return None;
                };
                if seq != incoming.next_seq {
                    warn!(
                        "Out of order chunk {} (expected {}) from {}, dropping transfer",
                        seq, incoming.next_seq, self.identity
                    );
                    self.incoming_files.remove(&transfer_id);
                    return None;
                }
                if (incoming.data.len() + data.len()) as u64 > incoming.size {
                    warn!(
                        "Transfer {} from {} overran its announced {} bytes, dropping it",
                        transfer_id, self.identity, incoming.size
                    );
                    self.incoming_files.remove(&transfer_id);
                    return None;
                }
                incoming.data.extend_from_slice(&data);
                incoming.next_seq += 1;
                if incoming.next_seq < incoming.chunks {
                    return None;
                }
                let incoming = self.incoming_files.remove(&transfer_id)?;
                self.finish_file(incoming)
            }
        }
    }

    /// Short transfers are discarded rather than surfaced truncated.
    fn finish_file(&self, incoming: IncomingFile) -> Option<ReceivedFile> {
        if incoming.data.len() as u64 != incoming.size {
            warn!(
                "'{}' from {} is {} bytes, header said {}",
                incoming.name,
                self.identity,
                incoming.data.len(),
                incoming.size
            );
            return None;
        }
        Some(ReceivedFile {
            from: self.identity.clone(),
            name: incoming.name,
            data: Bytes::from(incoming.data),
        })
    }

    fn ensure_open(&self, channel: ChannelLabel) -> Result<(), PeerError> {
        if self.state != PeerState::Connected || !self.open_channels.contains(&channel) {
            return Err(PeerError::ChannelNotOpen(channel));
        }
        Ok(())
    }

    pub async fn send_text(&self, text: &str) -> Result<(), PeerError> {
        self.ensure_open(ChannelLabel::Text)?;
        self.link
            .send(ChannelLabel::Text, ChannelPayload::Text(text.to_owned()))
            .await
    }

    pub async fn send_file(&self, name: &str, data: &[u8]) -> Result<(), PeerError> {
        self.ensure_open(ChannelLabel::File)?;
        for packet in FilePacket::split(name, data, self.file_chunk_size) {
            let bytes = packet.encode()?;
            self.link
                .send(ChannelLabel::File, ChannelPayload::Binary(Bytes::from(bytes)))
                .await?;
        }
        Ok(())
    }

    /// Swaps the outgoing tracks, e.g. camera for screen.
    pub async fn republish(&mut self, tracks: &[MediaTrack]) -> Result<(), PeerError> {
        if self.state == PeerState::Closed {
            return Err(PeerError::Closed);
        }
        self.link.publish(tracks).await?;
        self.published = tracks.to_vec();
        Ok(())
    }

    /// Feeds of the media the remote side sends over this link.
    pub async fn inbound_media(&self) -> Vec<MediaFeed> {
        if self.state == PeerState::Closed {
            return Vec::new();
        }
        self.link.inbound_media().await
    }

    /// Tears down the transport and both subchannels. Repeated calls do nothing.
    pub async fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.state = PeerState::Closed;
        self.open_channels.clear();
        self.pending_candidates.clear();
        self.incoming_files.clear();
        self.remote_stream = None;

        if let Err(e) = self.link.close().await {
            warn!("Error while closing link to {}: {}", self.identity, e);
        }
        info!("Closed link to {}", self.identity);
    }
}
