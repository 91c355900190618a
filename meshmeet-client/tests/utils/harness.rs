use anyhow::{Context, Result};
use meshmeet_client::media::SyntheticDevices;
use meshmeet_client::peer::{LoopbackNetwork, PeerState};
use meshmeet_client::{
    ClientConfig, MeshCoordinator, MeshEvent, MeshHandle, SessionState, SignalingClient,
    SignalingConnection,
};
use meshmeet_core::{Identity, RoomOptions, SessionId};
use meshmeet_server::SignalingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Relay plus media network shared by every participant of a test.
pub struct TestMesh {
    pub service: SignalingService,
    pub network: LoopbackNetwork,
}

impl TestMesh {
    pub fn new() -> Self {
        Self {
            service: SignalingService::default(),
            network: LoopbackNetwork::new(),
        }
    }

    pub async fn participant(&self, name: &str) -> Result<TestParticipant> {
        self.participant_with(name, SyntheticDevices::new()).await
    }

    pub async fn participant_with(
        &self,
        name: &str,
        devices: SyntheticDevices,
    ) -> Result<TestParticipant> {
        let local = self.service.connect_local();

        // Relay -> client frames pass through a switch so tests can cut the transport.
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (sever_tx, mut sever_rx) = oneshot::channel::<()>();
        let mut server_rx = local.incoming;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut sever_rx => break,
                    frame = server_rx.recv() => match frame {
                        Some(text) => {
                            if client_tx.send(text).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        let signaling = SignalingClient::new(
            SignalingConnection::from_parts(local.outgoing, client_rx),
            Duration::from_secs(5),
        );
        let session = MeshCoordinator::start(
            Identity::from(name),
            ClientConfig::default(),
            signaling,
            Arc::new(devices.clone()),
            Arc::new(self.network.factory_for(name)),
        )
        .await
        .with_context(|| format!("starting {name}"))?;

        Ok(TestParticipant {
            name: Identity::from(name),
            session_id: local.session_id,
            handle: session.handle,
            events: session.events,
            state: session.state,
            devices,
            sever: Some(sever_tx),
        })
    }

    /// `alice` hosts `room` with `capacity` seats, `bob` joins, both links come up.
    pub async fn connected_pair(
        &self,
        room: &str,
        capacity: usize,
    ) -> Result<(TestParticipant, TestParticipant)> {
        let mut alice = self.participant("alice").await?;
        let mut bob = self.participant("bob").await?;

        alice
            .handle
            .create_room_with(room, RoomOptions::with_capacity(capacity))
            .await?;
        bob.handle.join_room(room, "").await?;

        alice.wait_connected("bob").await?;
        bob.wait_connected("alice").await?;
        Ok((alice, bob))
    }
}

pub struct TestParticipant {
    pub name: Identity,
    pub session_id: SessionId,
    pub handle: MeshHandle,
    pub events: mpsc::UnboundedReceiver<MeshEvent>,
    pub state: watch::Receiver<SessionState>,
    pub devices: SyntheticDevices,
    sever: Option<oneshot::Sender<()>>,
}

impl TestParticipant {
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub async fn wait_state(
        &mut self,
        what: &str,
        pred: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState> {
        let state = timeout(WAIT, self.state.wait_for(pred))
            .await
            .with_context(|| format!("{} timed out waiting for {}", self.name, what))??;
        Ok(state.clone())
    }

    pub async fn wait_event(
        &mut self,
        what: &str,
        mut pred: impl FnMut(&MeshEvent) -> bool,
    ) -> Result<MeshEvent> {
        let events = &mut self.events;
        let found = timeout(WAIT, async move {
            while let Some(event) = events.recv().await {
                if pred(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .with_context(|| format!("{} timed out waiting for {}", self.name, what))?;
        found.with_context(|| format!("{} event stream ended before {}", self.name, what))
    }

    pub async fn wait_connected(&mut self, peer: &str) -> Result<SessionState> {
        let peer = Identity::from(peer);
        let what = format!("link to {peer}");
        self.wait_state(&what, |s| s.peers.get(&peer) == Some(&PeerState::Connected))
            .await
    }

    /// Drops the relay -> client direction, as if the socket died.
    pub fn sever_signaling(&mut self) {
        if let Some(tx) = self.sever.take() {
            let _ = tx.send(());
        }
    }
}
