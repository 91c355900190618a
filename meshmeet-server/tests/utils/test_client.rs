use anyhow::{Context, Result};
use meshmeet_core::{
    Identity, ProtocolFault, RequestFrame, RequestId, ServerFrame, SessionId, SignalEvent,
    SignalRequest,
};
use meshmeet_server::SignalingService;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single frame from the relay (ms).
pub const FRAME_TIMEOUT_MS: u64 = 2000;

/// Raw protocol client speaking to an in-process relay session.
pub struct TestClient {
    pub session_id: SessionId,
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
    next_id: u64,
    events: VecDeque<SignalEvent>,
}

impl TestClient {
    pub fn connect(service: &SignalingService) -> Self {
        let session = service.connect_local();
        Self {
            session_id: session.session_id,
            outgoing: session.outgoing,
            incoming: session.incoming,
            next_id: 1,
            events: VecDeque::new(),
        }
    }

    /// Connects and binds `identity`.
    pub async fn bound(service: &SignalingService, identity: &str) -> Result<Self> {
        let mut client = Self::connect(service);
        client
            .request(SignalRequest::BindIdentity(Identity::from(identity)))
            .await?
            .map_err(|f| anyhow::anyhow!("bind failed: {f}"))?;
        Ok(client)
    }

    /// Sends a request and waits for its ack (`Ok`) or reject (`Err`).
    /// Events arriving meanwhile are buffered.
    pub async fn request(&mut self, request: SignalRequest) -> Result<Result<String, ProtocolFault>> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        let json = serde_json::to_string(&RequestFrame { id, request })?;
        self.outgoing.send(json).context("relay session closed")?;

        loop {
            match self.next_frame().await? {
                ServerFrame::Ack { id: got, payload } if got == id => return Ok(Ok(payload)),
                ServerFrame::Reject { id: got, fault } if got == id => return Ok(Err(fault)),
                ServerFrame::Event { event } => self.events.push_back(event),
                other => anyhow::bail!("unexpected frame {other:?}"),
            }
        }
    }

    /// Like [`request`](Self::request) but decodes the ack body.
    pub async fn call<T: serde::de::DeserializeOwned>(&mut self, request: SignalRequest) -> Result<T> {
        let payload = self
            .request(request)
            .await?
            .map_err(|f| anyhow::anyhow!("rejected: {f}"))?;
        Ok(serde_json::from_str(&payload)?)
    }

    pub async fn next_event(&mut self) -> Result<SignalEvent> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        match self.next_frame().await? {
            ServerFrame::Event { event } => Ok(event),
            other => anyhow::bail!("expected event, got {other:?}"),
        }
    }

    /// Asserts nothing arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) -> Result<()> {
        if let Some(event) = self.events.pop_front() {
            anyhow::bail!("unexpected buffered event {event:?}");
        }
        match tokio::time::timeout(Duration::from_millis(ms), self.incoming.recv()).await {
            Err(_) => Ok(()),
            Ok(None) => Ok(()),
            Ok(Some(frame)) => anyhow::bail!("unexpected frame {frame}"),
        }
    }

    pub fn send_raw(&self, text: &str) -> Result<()> {
        self.outgoing.send(text.to_string()).context("relay session closed")
    }

    pub async fn next_frame(&mut self) -> Result<ServerFrame> {
        let text = tokio::time::timeout(Duration::from_millis(FRAME_TIMEOUT_MS), self.incoming.recv())
            .await
            .context("timed out waiting for relay frame")?
            .context("relay closed the session")?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Closes the transport side, as a dropped socket would.
    pub fn disconnect(self) {
        drop(self.outgoing);
    }
}
