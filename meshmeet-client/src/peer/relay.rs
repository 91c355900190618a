use crate::error::SignalingError;
use crate::signaling::SignalingClient;
use async_trait::async_trait;
use meshmeet_core::{NegotiationMessage, SessionId};

/// Path negotiation messages take to the remote peer.
#[async_trait]
pub trait NegotiationRelay: Send + Sync {
    async fn relay(&self, target: &SessionId, message: NegotiationMessage) -> Result<(), SignalingError>;
}

#[async_trait]
impl NegotiationRelay for SignalingClient {
    async fn relay(&self, target: &SessionId, message: NegotiationMessage) -> Result<(), SignalingError> {
        self.relay_to_peer(target, message).await.map(|_| ())
    }
}
