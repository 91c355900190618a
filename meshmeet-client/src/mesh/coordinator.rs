use crate::config::ClientConfig;
use crate::error::{MediaError, MeshError, PeerError};
use crate::media::{LocalMediaManager, MediaDevices, Recording, StreamRecorder, StreamSource};
use crate::mesh::{
    BroadcastReport, ChatMessage, MeshCommand, MeshEvent, MeshHandle, SessionPhase, SessionState,
};
use crate::peer::{
    LinkFactory, NegotiationRelay, PeerLink, PeerLinkParams, PeerNotice, PeerState,
    TaggedLinkEvent,
};
use crate::signaling::{SignalingClient, SignalingHandlers};
use bytes::Bytes;
use meshmeet_core::{
    Identity, MessageReceived, NegotiationMessage, ParticipantList, PeerJoined, PeerLeft,
    RelayedMessage, RoomInfo, RoomOptions, SessionId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Signaling push events, funneled into the coordinator task.
enum SignalInput {
    PeerJoined(PeerJoined),
    PeerLeft(PeerLeft),
    RoomClosed(String),
    Message(MessageReceived),
    Disconnected,
}

fn signal_handlers(tx: mpsc::UnboundedSender<SignalInput>) -> SignalingHandlers {
    let (joined, left, closed, message) = (tx.clone(), tx.clone(), tx.clone(), tx.clone());
    SignalingHandlers::new()
        .on_peer_joined(move |body| {
            let _ = joined.send(SignalInput::PeerJoined(body));
        })
        .on_peer_left(move |body| {
            let _ = left.send(SignalInput::PeerLeft(body));
        })
        .on_room_closed(move |room| {
            let _ = closed.send(SignalInput::RoomClosed(room));
        })
        .on_message_received(move |body| {
            let _ = message.send(SignalInput::Message(body));
        })
        .on_disconnected(move || {
            let _ = tx.send(SignalInput::Disconnected);
        })
}

/// What [`MeshCoordinator::start`] hands to the application shell.
pub struct MeshSession {
    pub handle: MeshHandle,
    pub events: mpsc::UnboundedReceiver<MeshEvent>,
    pub state: watch::Receiver<SessionState>,
}

/// Owns the identity -> [`PeerLink`] map of one meeting session.
///
/// Runs as a single task. Shell commands, signaling events and link
/// callbacks are all processed one at a time from that task, so the map has
/// exactly one writer.
pub struct MeshCoordinator {
    identity: Identity,
    config: ClientConfig,
    signaling: SignalingClient,
    relay: Arc<dyn NegotiationRelay>,
    media: LocalMediaManager,
    factory: Arc<dyn LinkFactory>,

    peers: BTreeMap<Identity, PeerLink>,
    recorders: BTreeMap<Identity, StreamRecorder>,
    room: Option<String>,
    ended: bool,
    running: bool,

    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<MeshEvent>,

    command_rx: mpsc::Receiver<MeshCommand>,
    signal_rx: mpsc::UnboundedReceiver<SignalInput>,
    link_rx: mpsc::UnboundedReceiver<TaggedLinkEvent>,
    link_tx: mpsc::UnboundedSender<TaggedLinkEvent>,
}

impl MeshCoordinator {
    /// Binds `identity` on the relay and spawns the coordinator task.
    ///
    /// Fails only when the bind is refused; everything after that is
    /// reported through the returned session.
    pub async fn start(
        identity: Identity,
        config: ClientConfig,
        signaling: SignalingClient,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn LinkFactory>,
    ) -> Result<MeshSession, MeshError> {
        let identity = signaling.bind_identity(&identity).await?;
        info!("Bound to signaling server as {}", identity);

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        signaling.set_handlers(signal_handlers(signal_tx));

        let (command_tx, command_rx) = mpsc::channel(64);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState {
            identity: Some(identity.clone()),
            ..Default::default()
        });

        let coordinator = Self {
            identity,
            config,
            relay: Arc::new(signaling.clone()),
            signaling,
            media: LocalMediaManager::new(devices),
            factory,
            peers: BTreeMap::new(),
            recorders: BTreeMap::new(),
            room: None,
            ended: false,
            running: true,
            state: state_tx,
            events: events_tx,
            command_rx,
            signal_rx,
            link_rx,
            link_tx,
        };
        tokio::spawn(coordinator.run());

        Ok(MeshSession {
            handle: MeshHandle::new(command_tx),
            events,
            state,
        })
    }

    async fn run(mut self) {
        info!("Mesh coordinator for {} started", self.identity);

        while self.running {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All mesh handles dropped. Shutting down.");
                            break;
                        }
                    }
                }

                Some(input) = self.signal_rx.recv() => self.handle_signal(input).await,

                Some(event) = self.link_rx.recv() => self.handle_link_event(event).await,
            }
        }

        if !self.ended {
            self.teardown(SessionPhase::Ended).await;
        }
        info!("Mesh coordinator for {} finished", self.identity);
    }

    async fn handle_command(&mut self, command: MeshCommand) {
        match command {
            MeshCommand::CreateRoom {
                name,
                options,
                reply,
            } => {
                let _ = reply.send(self.create_room(name, options).await);
            }
            MeshCommand::JoinRoom {
                name,
                password,
                reply,
            } => {
                let _ = reply.send(self.join_room(name, password).await);
            }
            MeshCommand::LeaveRoom { reply } => {
                let _ = reply.send(self.leave_room().await);
            }
            MeshCommand::CloseRoom { reply } => {
                let _ = reply.send(self.close_room().await);
            }
            MeshCommand::SendText { text, reply } => {
                let _ = reply.send(self.send_text(text).await);
            }
            MeshCommand::SendFile { name, data, reply } => {
                let _ = reply.send(self.send_file(name, data).await);
            }
            MeshCommand::ShareScreen { reply } => {
                let _ = reply.send(self.share_screen().await);
            }
            MeshCommand::StopScreenShare { reply } => {
                let _ = reply.send(self.stop_screen_share().await);
            }
            MeshCommand::ToggleTrack { kind, reply } => {
                let result = self
                    .ensure_active()
                    .map(|()| self.media.toggle_track_kind(kind));
                let _ = reply.send(result);
            }
            MeshCommand::Renegotiate { identity, reply } => {
                let _ = reply.send(self.renegotiate(identity).await);
            }
            MeshCommand::BroadcastSignal { payload, reply } => {
                let _ = reply.send(self.broadcast_signal(payload).await);
            }
            MeshCommand::StartRecording { identity, reply } => {
                let _ = reply.send(self.start_recording(identity).await);
            }
            MeshCommand::StopRecording { identity, reply } => {
                let _ = reply.send(self.stop_recording(identity).await);
            }
            MeshCommand::PeerStates { reply } => {
                let _ = reply.send(Ok(peer_states(&self.peers)));
            }
            MeshCommand::Shutdown { reply } => {
                if !self.ended {
                    self.teardown(SessionPhase::Ended).await;
                }
                self.running = false;
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn ensure_active(&self) -> Result<(), MeshError> {
        if self.ended {
            return Err(MeshError::SessionEnded);
        }
        Ok(())
    }

    fn room_name(&self) -> Result<String, MeshError> {
        self.ensure_active()?;
        self.room.clone().ok_or(MeshError::NotInRoom)
    }

    fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(f);
    }

    fn emit(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }

    // ---- commands ----

    async fn create_room(
        &mut self,
        name: String,
        options: RoomOptions,
    ) -> Result<ParticipantList, MeshError> {
        self.ensure_active()?;
        let participants = self.signaling.create_room_with(&name, &options).await?;
        info!("Created room '{}'", name);

        let room = RoomInfo {
            name: name.clone(),
            host: self.identity.clone(),
            capacity: options.capacity.max(1),
            has_password: options.password.as_deref().is_some_and(|p| !p.is_empty()),
            participants: participants.clone(),
        };
        self.room = Some(name);
        self.update_state(|s| s.enter_room(room));
        self.acquire_local_media().await;
        Ok(participants)
    }

    async fn join_room(&mut self, name: String, password: String) -> Result<RoomInfo, MeshError> {
        self.ensure_active()?;
        let seated = self.signaling.begin_join(&name, &password).await?;
        debug!(
            "Seated in '{}' with {} participants",
            name,
            seated.participants.len()
        );
        self.room = Some(name.clone());

        // Nobody offers to us before complete_join, so capture can finish first.
        self.acquire_local_media().await;

        let joined = match self.signaling.complete_join(&name).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Failed to complete join of '{}': {}", name, e);
                if let Err(e) = self.signaling.leave_room(&name).await {
                    debug!("Leaving half-joined room failed: {}", e);
                }
                self.room = None;
                self.media.release();
                self.update_state(|s| {
                    s.active_source = None;
                    s.media_constraints = None;
                });
                return Err(e.into());
            }
        };
        info!(
            "Joined room '{}' ({} participants)",
            name,
            joined.participants.len()
        );

        let room = joined.room.clone();
        self.update_state(|s| s.enter_room(joined.room));
        Ok(room)
    }

    /// Capture failure is not fatal: the participant still receives.
    async fn acquire_local_media(&mut self) {
        let constraints = self.config.media.clone();
        if constraints.is_empty() {
            debug!("Local capture disabled, joining receive-only");
            return;
        }
        if let Err(e) = self.media.acquire_user_media(&constraints).await {
            warn!("Continuing without local media: {}", e);
            self.emit(MeshEvent::MediaUnavailable(e));
        }
        let source = self.media.active_source();
        self.update_state(|s| {
            s.media_constraints = Some(constraints);
            s.active_source = source;
        });
    }

    async fn leave_room(&mut self) -> Result<(), MeshError> {
        let name = self.room_name()?;
        if let Err(e) = self.signaling.leave_room(&name).await {
            warn!("Relay did not acknowledge leaving '{}': {}", name, e);
        }
        info!("Left room '{}'", name);
        self.teardown(SessionPhase::Ended).await;
        Ok(())
    }

    async fn close_room(&mut self) -> Result<(), MeshError> {
        let name = self.room_name()?;
        self.signaling.close_room(&name).await?;
        info!("Closed room '{}'", name);
        self.teardown(SessionPhase::Ended).await;
        self.emit(MeshEvent::RoomClosed(name));
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<BroadcastReport, MeshError> {
        self.room_name()?;
        let mut report = BroadcastReport::default();
        for (identity, link) in &self.peers {
            match link.send_text(&text).await {
                Ok(()) => report.delivered.push(identity.clone()),
                Err(e) => {
                    debug!("Text to {} not delivered: {}", identity, e);
                    report.failed.push((identity.clone(), e));
                }
            }
        }

        let message = ChatMessage::new(self.identity.clone(), text);
        self.update_state(|s| s.record_message(message));
        Ok(report)
    }

    async fn send_file(&mut self, name: String, data: Bytes) -> Result<BroadcastReport, MeshError> {
        self.room_name()?;
        let mut report = BroadcastReport::default();
        for (identity, link) in &self.peers {
            match link.send_file(&name, &data).await {
                Ok(()) => report.delivered.push(identity.clone()),
                Err(e) => {
                    warn!("File '{}' to {} not delivered: {}", name, identity, e);
                    report.failed.push((identity.clone(), e));
                }
            }
        }
        info!(
            "Sent '{}' ({} bytes) to {} peers",
            name,
            data.len(),
            report.delivered.len()
        );
        Ok(report)
    }

    async fn share_screen(&mut self) -> Result<(), MeshError> {
        self.ensure_active()?;
        let constraints = self.config.screen.clone();
        self.media.acquire_screen_media(&constraints).await?;
        self.media.activate(StreamSource::Screen)?;
        info!("Sharing screen with {} peers", self.peers.len());
        self.republish_all().await;
        Ok(())
    }

    async fn stop_screen_share(&mut self) -> Result<(), MeshError> {
        self.ensure_active()?;
        let switched = if self.config.media.is_empty() {
            Ok(())
        } else {
            self.media.switch_to_user().await.map(|_| ())
        };
        self.media.stop_screen();
        self.republish_all().await;
        switched?;
        info!("Stopped screen share");
        Ok(())
    }

    /// Puts the active stream's tracks on every link and renegotiates.
    async fn republish_all(&mut self) {
        let tracks = self.media.active_tracks();
        let source = self.media.active_source();
        for link in self.peers.values_mut() {
            if let Err(e) = link.republish(&tracks).await {
                warn!("Failed to republish to {}: {}", link.identity(), e);
                continue;
            }
            link.start_negotiation(&self.config.offer).await;
        }
        self.update_state(|s| s.active_source = source);
    }

    async fn renegotiate(&mut self, identity: Identity) -> Result<(), MeshError> {
        self.ensure_active()?;
        let mut previous = self
            .peers
            .remove(&identity)
            .ok_or_else(|| MeshError::UnknownPeer(identity.clone()))?;
        let session_id = previous.session_id().clone();
        previous.close().await;

        info!("Renegotiating with {} on a fresh link", identity);
        let mut link = self.open_link(&identity, session_id).await?;
        link.start_negotiation(&self.config.offer).await;
        self.insert_peer(link);
        Ok(())
    }

    async fn broadcast_signal(&mut self, payload: serde_json::Value) -> Result<usize, MeshError> {
        let name = self.room_name()?;
        let ack = self.signaling.broadcast(&name, payload).await?;
        Ok(ack.delivered)
    }

    async fn start_recording(&mut self, identity: Identity) -> Result<(), MeshError> {
        self.room_name()?;
        if self.recorders.contains_key(&identity) {
            debug!("Already recording {}", identity);
            return Ok(());
        }

        let feeds = if identity == self.identity {
            let stream = self
                .media
                .active_stream()
                .ok_or(MediaError::NotAcquired(StreamSource::User))?;
            stream
                .tracks()
                .iter()
                .map(|t| (t.kind(), t.subscribe()))
                .collect::<Vec<_>>()
        } else {
            self.peers
                .get(&identity)
                .ok_or_else(|| MeshError::UnknownPeer(identity.clone()))?
                .inbound_media()
                .await
        };
        if feeds.is_empty() {
            return Err(MeshError::NothingToRecord(identity));
        }

        info!("Recording {} ({} tracks)", identity, feeds.len());
        let recorder =
            StreamRecorder::start(identity.clone(), feeds, self.config.recording.clone());
        self.update_state(|s| {
            s.recording.insert(identity.clone());
        });
        self.recorders.insert(identity, recorder);
        Ok(())
    }

    async fn stop_recording(&mut self, identity: Identity) -> Result<Recording, MeshError> {
        let recorder = self
            .recorders
            .remove(&identity)
            .ok_or(MeshError::NotRecording(identity))?;
        self.finish_recording(recorder).await
    }

    async fn finish_recording(&mut self, recorder: StreamRecorder) -> Result<Recording, MeshError> {
        let identity = recorder.identity().clone();
        self.update_state(|s| {
            s.recording.remove(&identity);
        });
        let recording = recorder.stop().await?;
        info!(
            "Recorded {} chunks ({} bytes) of {}",
            recording.chunks.len(),
            recording.byte_len(),
            identity
        );
        self.emit(MeshEvent::RecordingFinished(recording.clone()));
        Ok(recording)
    }

    /// Closes every link, releases capture and drops the relay connection.
    ///
    /// Running recorders are finished first so their last chunks still surface.
    async fn teardown(&mut self, phase: SessionPhase) {
        let recorders: Vec<StreamRecorder> =
            std::mem::take(&mut self.recorders).into_values().collect();
        for recorder in recorders {
            let identity = recorder.identity().clone();
            if let Err(e) = self.finish_recording(recorder).await {
                warn!("Recording of {} was lost: {}", identity, e);
            }
        }
        let links: Vec<PeerLink> = std::mem::take(&mut self.peers).into_values().collect();
        for mut link in links {
            link.close().await;
        }
        self.media.release();
        self.signaling.disconnect();
        self.room = None;
        self.ended = true;
        self.update_state(|s| s.reset(phase));
        info!("Mesh session for {} torn down", self.identity);
    }

    // ---- links ----

    async fn open_link(
        &self,
        identity: &Identity,
        session_id: SessionId,
    ) -> Result<PeerLink, PeerError> {
        let tracks = self.media.active_tracks();
        PeerLink::open(PeerLinkParams {
            identity: identity.clone(),
            session_id,
            factory: self.factory.as_ref(),
            ice_servers: &self.config.ice_servers,
            local_tracks: &tracks,
            relay: self.relay.clone(),
            events: self.link_tx.clone(),
            file_chunk_size: self.config.file_chunk_size,
            max_file_size: self.config.max_file_size,
        })
        .await
    }

    fn insert_peer(&mut self, link: PeerLink) {
        let (identity, state) = (link.identity().clone(), link.state());
        self.update_state(|s| {
            s.peers.insert(identity.clone(), state);
        });
        self.peers.insert(identity, link);
    }

    async fn drop_peer(&mut self, identity: &Identity) {
        if let Some(mut link) = self.peers.remove(identity) {
            link.close().await;
        }
        self.update_state(|s| {
            s.peers.remove(identity);
            s.remote_streams.remove(identity);
        });
    }

    fn sync_peer(&self, identity: &Identity) {
        if let Some(link) = self.peers.get(identity) {
            let state = link.state();
            self.update_state(|s| {
                s.peers.insert(identity.clone(), state);
            });
        }
    }

    // ---- signaling events ----

    async fn handle_signal(&mut self, input: SignalInput) {
        if self.ended {
            debug!("Ignoring signaling event after session end");
            return;
        }

        match input {
            SignalInput::PeerJoined(joined) => self.on_peer_joined(joined).await,
            SignalInput::PeerLeft(left) => self.on_peer_left(left).await,
            SignalInput::Message(received) => self.on_message(received).await,
            SignalInput::RoomClosed(name) => {
                if self.room.as_ref().is_some_and(|room| room != &name) {
                    debug!("Ignoring close of foreign room '{}'", name);
                    return;
                }
                info!("Room '{}' was closed by its host", name);
                self.teardown(SessionPhase::Ended).await;
                self.emit(MeshEvent::RoomClosed(name));
            }
            SignalInput::Disconnected => {
                warn!("Lost the signaling server; existing peer links stay up");
                self.update_state(|s| s.phase = SessionPhase::Disconnected);
                self.emit(MeshEvent::SignalingLost);
            }
        }
    }

    /// We are the offering side for anyone who joins after us.
    async fn on_peer_joined(&mut self, joined: PeerJoined) {
        if joined.identity == self.identity {
            return;
        }
        info!("{} joined", joined.identity);
        let identity = joined.identity.clone();
        self.update_state(|s| {
            s.set_participants(joined.participants);
            if let Some(room) = s.room.as_mut() {
                room.capacity = joined.room.capacity;
            }
        });
        self.emit(MeshEvent::PeerJoined(identity.clone()));

        if let Some(existing) = self.peers.get(&identity) {
            if existing.session_id() == &joined.session_id {
                debug!("Already linked to {}", identity);
                return;
            }
            info!("{} rejoined from a new session, replacing link", identity);
            self.drop_peer(&identity).await;
        }

        match self.open_link(&identity, joined.session_id).await {
            Ok(mut link) => {
                link.start_negotiation(&self.config.offer).await;
                self.insert_peer(link);
            }
            Err(e) => warn!("Failed to open link to {}: {}", identity, e),
        }
    }

    async fn on_peer_left(&mut self, left: PeerLeft) {
        if left.identity == self.identity {
            return;
        }
        info!("{} left", left.identity);
        if let Some(recorder) = self.recorders.remove(&left.identity)
            && let Err(e) = self.finish_recording(recorder).await
        {
            warn!("Recording of {} was lost: {}", left.identity, e);
        }
        if let Some(mut link) = self.peers.remove(&left.identity) {
            link.close().await;
        }
        self.update_state(|s| {
            s.remove_peer(&left.identity);
            s.set_participants(left.participants);
        });
        self.emit(MeshEvent::PeerLeft(left.identity));
    }

    async fn on_message(&mut self, received: MessageReceived) {
        if received.identity == self.identity {
            return;
        }
        match received.message {
            RelayedMessage::Broadcast(payload) => self.emit(MeshEvent::Broadcast {
                from: received.identity,
                payload,
            }),
            RelayedMessage::Direct(message) => {
                self.on_negotiation(received.identity, received.session_id, message)
                    .await
            }
        }
    }

    /// Negotiation from an unknown peer makes us the answering side.
    async fn on_negotiation(
        &mut self,
        from: Identity,
        session_id: SessionId,
        message: NegotiationMessage,
    ) {
        let needs_link = match self.peers.get_mut(&from) {
            None => true,
            Some(link) if link.session_id() != &session_id => {
                if matches!(message, NegotiationMessage::Offer(_)) {
                    info!("Fresh offer from {} on a new session, replacing link", from);
                    true
                } else {
                    link.retarget(session_id.clone());
                    false
                }
            }
            Some(_) => false,
        };

        if needs_link {
            self.drop_peer(&from).await;
            match self.open_link(&from, session_id).await {
                Ok(link) => self.insert_peer(link),
                Err(e) => {
                    warn!("Failed to open answering link to {}: {}", from, e);
                    return;
                }
            }
        }

        if let Some(link) = self.peers.get_mut(&from) {
            link.handle_negotiation_message(message).await;
        }
        self.sync_peer(&from);
    }

    // ---- link callbacks ----

    async fn handle_link_event(&mut self, tagged: TaggedLinkEvent) {
        let Some(link) = self.peers.get_mut(&tagged.identity) else {
            debug!("Dropping link event for unlinked {}", tagged.identity);
            return;
        };
        if link.link_id() != tagged.link {
            debug!("Dropping event from replaced link to {}", tagged.identity);
            return;
        }

        let notice = link.handle_link_event(tagged.event).await;
        let identity = tagged.identity;
        self.sync_peer(&identity);

        let Some(notice) = notice else {
            return;
        };
        match notice {
            PeerNotice::Connected => self.emit(MeshEvent::PeerConnected(identity)),
            PeerNotice::RemoteStream(track) => {
                self.update_state(|s| {
                    s.remote_streams.insert(identity.clone(), track.clone());
                });
                self.emit(MeshEvent::RemoteStream { identity, track });
            }
            PeerNotice::Text(text) => {
                let message = ChatMessage::new(identity, text);
                self.update_state(|s| s.record_message(message.clone()));
                self.emit(MeshEvent::TextMessage(message));
            }
            PeerNotice::File(file) => {
                info!("Received '{}' from {}", file.name, file.from);
                self.emit(MeshEvent::FileReceived(file));
            }
        }
    }
}

impl std::fmt::Debug for MeshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshCoordinator")
            .field("identity", &self.identity)
            .field("room", &self.room)
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .field("ended", &self.ended)
            .finish()
    }
}

fn peer_states(peers: &BTreeMap<Identity, PeerLink>) -> BTreeMap<Identity, PeerState> {
    peers
        .iter()
        .map(|(identity, link)| (identity.clone(), link.state()))
        .collect()
}
