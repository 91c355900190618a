use crate::error::PeerError;
use crate::media::MediaTrack;
use crate::peer::{
    ChannelLabel, ChannelPayload, LinkEvent, LinkEventSender, LinkFactory, LinkState,
    MediaFeed, OfferOptions, RemoteTrack, RtcLink, SdpKind,
};
use async_trait::async_trait;
use meshmeet_core::{IceCandidate, IceServerConfig, Identity, SessionDescription};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SDP_ORIGIN: &str = "o=loopback ";

struct Endpoint {
    local: Identity,
    remote: Identity,
    events: LinkEventSender,
    local_description: Option<SdpKind>,
    remote_description: bool,
    peer: Option<u64>,
    applied: Vec<IceCandidate>,
    published: Vec<MediaTrack>,
    connected: bool,
    closed: bool,
}

#[derive(Default)]
struct NetworkState {
    endpoints: HashMap<u64, Endpoint>,
    latest: HashMap<(Identity, Identity), u64>,
    next_id: u64,
    fail_offers: HashSet<Identity>,
}

/// In-process media transport.
///
/// Links built from the same network find each other through the endpoint
/// id embedded in their session descriptions. A pair connects once both
/// sides hold the other's description and at least one candidate, which
/// mirrors when ICE could first succeed.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory_for(&self, local: impl Into<Identity>) -> LoopbackFactory {
        LoopbackFactory {
            network: self.clone(),
            local: local.into(),
        }
    }

    /// Makes every offer created by `identity` fail.
    pub fn fail_offers_for(&self, identity: impl Into<Identity>, fail: bool) {
        let identity = identity.into();
        let mut state = self.lock();
        if fail {
            state.fail_offers.insert(identity);
        } else {
            state.fail_offers.remove(&identity);
        }
    }

    pub fn applied_candidates(&self, local: &str, remote: &str) -> usize {
        self.with_latest(local, remote, |e| e.applied.len())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, local: &str, remote: &str) -> bool {
        self.with_latest(local, remote, |e| e.connected && !e.closed)
            .unwrap_or_default()
    }

    pub fn is_closed(&self, local: &str, remote: &str) -> bool {
        self.with_latest(local, remote, |e| e.closed)
            .unwrap_or_default()
    }

    /// Links ever created from `local` to `remote`.
    pub fn link_count(&self, local: &str, remote: &str) -> usize {
        let state = self.lock();
        state
            .endpoints
            .values()
            .filter(|e| e.local.as_str() == local && e.remote.as_str() == remote)
            .count()
    }

    fn with_latest<T>(&self, local: &str, remote: &str, f: impl FnOnce(&Endpoint) -> T) -> Option<T> {
        let state = self.lock();
        let id = state
            .latest
            .get(&(Identity::from(local), Identity::from(remote)))?;
        state.endpoints.get(id).map(f)
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        // A poisoned lock only means a test panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct LoopbackFactory {
    network: LoopbackNetwork,
    local: Identity,
}

#[async_trait]
impl LinkFactory for LoopbackFactory {
    async fn create_link(
        &self,
        remote: &Identity,
        _ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Box<dyn RtcLink>, PeerError> {
        let mut state = self.network.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.endpoints.insert(
            id,
            Endpoint {
                local: self.local.clone(),
                remote: remote.clone(),
                events,
                local_description: None,
                remote_description: false,
                peer: None,
                applied: Vec::new(),
                published: Vec::new(),
                connected: false,
                closed: false,
            },
        );
        state.latest.insert((self.local.clone(), remote.clone()), id);
        debug!("Loopback endpoint {} for {} -> {}", id, self.local, remote);

        Ok(Box::new(LoopbackLink {
            network: self.network.clone(),
            id,
        }))
    }
}

struct LoopbackLink {
    network: LoopbackNetwork,
    id: u64,
}

impl LoopbackLink {
    fn describe(&self, state: &NetworkState) -> Result<SessionDescription, PeerError> {
        let endpoint = endpoint(state, self.id)?;
        let mut sdp = format!(
            "v=0\r\n{SDP_ORIGIN}{} 0 IN IP4 127.0.0.1\r\ns={}\r\n",
            self.id, endpoint.local
        );
        for label in ChannelLabel::ALL {
            sdp.push_str(&format!("a=channel:{}:{}\r\n", label.negotiated_id(), label));
        }
        for track in &endpoint.published {
            sdp.push_str(&format!("a=track:{}:{}\r\n", track.kind(), track.id()));
        }
        Ok(SessionDescription::new(sdp))
    }

    /// Commits a local description and trickles this endpoint's one host candidate.
    fn commit_local(&self, state: &mut NetworkState, kind: SdpKind) -> Result<SessionDescription, PeerError> {
        let description = self.describe(state)?;
        let endpoint = endpoint_mut(state, self.id)?;
        endpoint.local_description = Some(kind);
        endpoint.events.emit(LinkEvent::CandidateDiscovered(IceCandidate {
            candidate: format!(
                "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                self.id,
                40000 + self.id
            ),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }));
        Ok(description)
    }
}

fn endpoint(state: &NetworkState, id: u64) -> Result<&Endpoint, PeerError> {
    match state.endpoints.get(&id) {
        Some(e) if !e.closed => Ok(e),
        _ => Err(PeerError::Closed),
    }
}

fn endpoint_mut(state: &mut NetworkState, id: u64) -> Result<&mut Endpoint, PeerError> {
    match state.endpoints.get_mut(&id) {
        Some(e) if !e.closed => Ok(e),
        _ => Err(PeerError::Closed),
    }
}

fn parse_origin(sdp: &str) -> Result<u64, PeerError> {
    sdp.lines()
        .find_map(|line| line.strip_prefix(SDP_ORIGIN))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| PeerError::Sdp("not a loopback session description".to_string()))
}

fn ready(endpoint: &Endpoint) -> bool {
    !endpoint.closed && endpoint.remote_description && !endpoint.applied.is_empty()
}

fn remote_tracks(tracks: &[MediaTrack]) -> impl Iterator<Item = RemoteTrack> + '_ {
    tracks.iter().map(|t| RemoteTrack {
        id: t.id().to_string(),
        kind: t.kind(),
    })
}

/// Connects `id` and its peer if both are ready.
fn try_connect(state: &mut NetworkState, id: u64) {
    let Some(a) = state.endpoints.get(&id) else {
        return;
    };
    if a.connected || !ready(a) {
        return;
    }
    let Some(peer_id) = a.peer else {
        return;
    };
    let Some(b) = state.endpoints.get(&peer_id) else {
        return;
    };
    if !ready(b) || b.peer != Some(id) {
        return;
    }

    debug!("Loopback endpoints {} and {} connected", id, peer_id);
    for (this, other) in [(id, peer_id), (peer_id, id)] {
        let other_tracks: Vec<RemoteTrack> = state
            .endpoints
            .get(&other)
            .map(|e| remote_tracks(&e.published).collect())
            .unwrap_or_default();
        let Some(endpoint) = state.endpoints.get_mut(&this) else {
            continue;
        };
        endpoint.connected = true;
        // Subchannels first, so a link reported connected can already send.
        for label in ChannelLabel::ALL {
            endpoint.events.emit(LinkEvent::ChannelOpened(label));
        }
        endpoint.events.emit(LinkEvent::StateChanged(LinkState::Connected));
        for track in other_tracks {
            endpoint.events.emit(LinkEvent::TrackReceived(track));
        }
    }
}

#[async_trait]
impl RtcLink for LoopbackLink {
    async fn create_offer(&self, _options: &OfferOptions) -> Result<SessionDescription, PeerError> {
        let mut state = self.network.lock();
        let local = endpoint(&state, self.id)?.local.clone();
        if state.fail_offers.contains(&local) {
            return Err(PeerError::Sdp(format!("offer creation disabled for {local}")));
        }
        self.commit_local(&mut state, SdpKind::Offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let mut state = self.network.lock();
        if !endpoint(&state, self.id)?.remote_description {
            return Err(PeerError::Sdp("no remote offer to answer".to_string()));
        }
        self.commit_local(&mut state, SdpKind::Answer)
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        let peer = parse_origin(&description.sdp)?;
        let mut state = self.network.lock();
        let endpoint = endpoint_mut(&mut state, self.id)?;
        if kind == SdpKind::Answer && endpoint.local_description != Some(SdpKind::Offer) {
            return Err(PeerError::Sdp("answer without a local offer".to_string()));
        }
        endpoint.peer = Some(peer);
        endpoint.remote_description = true;
        try_connect(&mut state, self.id);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        if !candidate.candidate.starts_with("candidate:") {
            return Err(PeerError::Candidate(format!("malformed candidate '{}'", candidate.candidate)));
        }
        let mut state = self.network.lock();
        let endpoint = endpoint_mut(&mut state, self.id)?;
        if !endpoint.remote_description {
            return Err(PeerError::Candidate("remote description not set".to_string()));
        }
        endpoint.applied.push(candidate);
        try_connect(&mut state, self.id);
        Ok(())
    }

    async fn publish(&self, tracks: &[MediaTrack]) -> Result<(), PeerError> {
        let mut state = self.network.lock();
        let endpoint = endpoint_mut(&mut state, self.id)?;
        endpoint.published = tracks.to_vec();
        let (connected, peer) = (endpoint.connected, endpoint.peer);

        if connected
            && let Some(remote) = peer.and_then(|p| state.endpoints.get(&p))
            && !remote.closed
        {
            for track in remote_tracks(tracks) {
                remote.events.emit(LinkEvent::TrackReceived(track));
            }
        }
        Ok(())
    }

    async fn send(&self, channel: ChannelLabel, payload: ChannelPayload) -> Result<(), PeerError> {
        let state = self.network.lock();
        let endpoint = endpoint(&state, self.id)?;
        if !endpoint.connected {
            return Err(PeerError::ChannelNotOpen(channel));
        }
        match endpoint.peer.and_then(|p| state.endpoints.get(&p)) {
            Some(remote) if !remote.closed => {
                remote.events.emit(LinkEvent::ChannelMessage(channel, payload));
                Ok(())
            }
            _ => Err(PeerError::Transport("remote endpoint is gone".to_string())),
        }
    }

    async fn inbound_media(&self) -> Vec<MediaFeed> {
        let state = self.network.lock();
        let Ok(endpoint) = endpoint(&state, self.id) else {
            return Vec::new();
        };
        if !endpoint.connected {
            return Vec::new();
        }
        match endpoint.peer.and_then(|p| state.endpoints.get(&p)) {
            Some(remote) if !remote.closed => remote
                .published
                .iter()
                .map(|t| (t.kind(), t.subscribe()))
                .collect(),
            _ => Vec::new(),
        }
    }

    async fn close(&self) -> Result<(), PeerError> {
        let mut state = self.network.lock();
        let Some(endpoint) = state.endpoints.get_mut(&self.id) else {
            return Ok(());
        };
        if endpoint.closed {
            return Ok(());
        }
        endpoint.closed = true;
        let (was_connected, peer) = (endpoint.connected, endpoint.peer);
        endpoint.connected = false;

        if was_connected
            && let Some(remote) = peer.and_then(|p| state.endpoints.get_mut(&p))
            && !remote.closed
            && remote.connected
        {
            remote.connected = false;
            for label in ChannelLabel::ALL {
                remote.events.emit(LinkEvent::ChannelClosed(label));
            }
            remote.events.emit(LinkEvent::StateChanged(LinkState::Disconnected));
        }
        Ok(())
    }
}
