use crate::error::PeerError;
use crate::media::{FRAME_BUFFER, MediaTrack, TrackKind};
use crate::peer::{
    ChannelLabel, ChannelPayload, LinkEvent, LinkEventSender, LinkFactory, LinkState,
    MediaFeed, OfferOptions, RemoteTrack, RtcLink, SdpKind,
};
use bytes::Bytes;
use async_trait::async_trait;
use meshmeet_core::{IceCandidate, IceServerConfig, Identity, SessionDescription};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Builds real WebRTC links (ICE, DTLS, SCTP) on top of webrtc-rs.
pub struct WebRtcLinkFactory {
    api: API,
}

impl WebRtcLinkFactory {
    pub fn new() -> Result<Self, PeerError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api })
    }
}

fn rtc_ice_servers(servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|s| RTCIceServer {
            urls: s.urls.clone(),
            username: s.username.clone().unwrap_or_default(),
            credential: s.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

#[async_trait]
impl LinkFactory for WebRtcLinkFactory {
    async fn create_link(
        &self,
        remote: &Identity,
        ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Box<dyn RtcLink>, PeerError> {
        let rtc_config = RTCConfiguration {
            ice_servers: rtc_ice_servers(ice_servers),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(rtc_config).await?);

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                debug!("Peer connection to {} is {:?}", events.identity(), s);
                let state = match s {
                    RTCPeerConnectionState::Connecting => LinkState::Connecting,
                    RTCPeerConnectionState::Connected => LinkState::Connected,
                    RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                    RTCPeerConnectionState::Failed => LinkState::Failed,
                    RTCPeerConnectionState::Closed => LinkState::Closed,
                    _ => LinkState::New,
                };
                events.emit(LinkEvent::StateChanged(state));
            })
        }));

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(LinkEvent::CandidateDiscovered(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }));
            })
        }));

        let inbound: Arc<Mutex<Vec<(TrackKind, broadcast::Sender<Bytes>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let track_events = events.clone();
        let track_feeds = inbound.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let events = track_events.clone();
            let feeds = track_feeds.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Video => TrackKind::Video,
                    RTPCodecType::Audio => TrackKind::Audio,
                    other => {
                        debug!("Ignoring remote track of kind {}", other);
                        return;
                    }
                };

                let (frames, _) = broadcast::channel(FRAME_BUFFER);
                feeds.lock().await.push((kind, frames.clone()));
                let reader = track.clone();
                tokio::spawn(async move {
                    while let Ok((packet, _)) = reader.read_rtp().await {
                        // Nobody subscribed is fine; frames are only kept for recorders.
                        let _ = frames.send(packet.payload);
                    }
                    debug!("Remote {} track {} ended", kind, reader.id());
                });

                events.emit(LinkEvent::TrackReceived(RemoteTrack {
                    id: track.id(),
                    kind,
                }));
            })
        }));

        let mut channels = HashMap::new();
        for label in ChannelLabel::ALL {
            let init = RTCDataChannelInit {
                ordered: Some(true),
                negotiated: Some(label.negotiated_id()),
                ..Default::default()
            };
            let dc = pc.create_data_channel(label.as_str(), Some(init)).await?;
            setup_data_channel(&dc, label, events.clone());
            channels.insert(label, dc);
        }

        info!("WebRTC link to {} created", remote);
        Ok(Box::new(WebRtcLink {
            pc,
            channels,
            senders: Mutex::new(Vec::new()),
            inbound,
            receive_audio: AtomicBool::new(false),
            receive_video: AtomicBool::new(false),
        }))
    }
}

fn setup_data_channel(dc: &Arc<RTCDataChannel>, label: ChannelLabel, events: LinkEventSender) {
    let open_events = events.clone();
    dc.on_open(Box::new(move || {
        let events = open_events.clone();
        Box::pin(async move {
            events.emit(LinkEvent::ChannelOpened(label));
        })
    }));

    let close_events = events.clone();
    dc.on_close(Box::new(move || {
        let events = close_events.clone();
        Box::pin(async move {
            events.emit(LinkEvent::ChannelClosed(label));
        })
    }));

    dc.on_error(Box::new(move |err| {
        Box::pin(async move {
            error!("{} channel error: {}", label, err);
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let events = events.clone();
        Box::pin(async move {
            let payload = if msg.is_string {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => ChannelPayload::Text(text),
                    Err(_) => ChannelPayload::Binary(msg.data),
                }
            } else {
                ChannelPayload::Binary(msg.data)
            };
            events.emit(LinkEvent::ChannelMessage(label, payload));
        })
    }));
}

struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
    channels: HashMap<ChannelLabel, Arc<RTCDataChannel>>,
    senders: Mutex<Vec<(TrackKind, Arc<RTCRtpSender>)>>,
    inbound: Arc<Mutex<Vec<(TrackKind, broadcast::Sender<Bytes>)>>>,
    receive_audio: AtomicBool,
    receive_video: AtomicBool,
}

impl WebRtcLink {
    /// Adds a receive-only transceiver for `kind` unless something already carries it.
    async fn ensure_receiving(&self, kind: TrackKind) -> Result<(), PeerError> {
        let (flag, codec_type) = match kind {
            TrackKind::Audio => (&self.receive_audio, RTPCodecType::Audio),
            TrackKind::Video => (&self.receive_video, RTPCodecType::Video),
        };
        let sending = self.senders.lock().await.iter().any(|(k, _)| *k == kind);
        if sending || flag.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.pc
            .add_transceiver_from_kind(
                codec_type,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RtcLink for WebRtcLink {
    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, PeerError> {
        if options.offer_to_receive_audio {
            self.ensure_receiving(TrackKind::Audio).await?;
        }
        if options.offer_to_receive_video {
            self.ensure_receiving(TrackKind::Video).await?;
        }

        let offer = self
            .pc
            .create_offer(Some(RTCOfferOptions {
                ice_restart: options.ice_restart,
                ..Default::default()
            }))
            .await
            .map_err(|e| PeerError::Sdp(e.to_string()))?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| PeerError::Sdp(e.to_string()))?;
        Ok(SessionDescription::new(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| PeerError::Sdp(e.to_string()))?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| PeerError::Sdp(e.to_string()))?;
        Ok(SessionDescription::new(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
        }
        .map_err(|e| PeerError::Sdp(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| PeerError::Sdp(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| PeerError::Candidate(e.to_string()))
    }

    async fn publish(&self, tracks: &[MediaTrack]) -> Result<(), PeerError> {
        let mut senders = self.senders.lock().await;
        for (_, sender) in senders.drain(..) {
            self.pc.remove_track(&sender).await?;
        }

        for track in tracks {
            let mime_type = match track.kind() {
                TrackKind::Video => MIME_TYPE_VP8,
                TrackKind::Audio => MIME_TYPE_OPUS,
            };
            let local = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_owned(),
                format!("meshmeet-{}", track.label()),
            ));
            let sender = self
                .pc
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await?;
            senders.push((track.kind(), sender));
        }
        Ok(())
    }

    async fn send(&self, channel: ChannelLabel, payload: ChannelPayload) -> Result<(), PeerError> {
        let dc = self
            .channels
            .get(&channel)
            .ok_or(PeerError::ChannelNotOpen(channel))?;
        match payload {
            ChannelPayload::Text(text) => dc.send_text(text).await?,
            ChannelPayload::Binary(bytes) => dc.send(&bytes).await?,
        };
        Ok(())
    }

    async fn inbound_media(&self) -> Vec<MediaFeed> {
        self.inbound
            .lock()
            .await
            .iter()
            .map(|(kind, frames)| (*kind, frames.subscribe()))
            .collect()
    }

    async fn close(&self) -> Result<(), PeerError> {
        for dc in self.channels.values() {
            let _ = dc.close().await;
        }
        self.pc.close().await?;
        Ok(())
    }
}
