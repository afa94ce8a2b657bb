use charades_core::RoomCode;
use charades_types::{RelayedSignal, ServerMessage, SignalMessage};
use std::sync::Arc;
use tracing::debug;

use crate::websocket::{ConnectionId, ConnectionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Forwards connection-negotiation payloads between two members of the same
/// room. Reads membership only; never looks inside the payload.
pub struct SignalingRelay {
    connections: Arc<ConnectionManager>,
}

impl SignalingRelay {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Returns true if the signal was delivered. Anything else is a silent
    /// drop: peers that already left are an expected race.
    pub async fn forward(
        &self,
        from: ConnectionId,
        kind: SignalKind,
        signal: SignalMessage,
    ) -> bool {
        let Ok(code) = RoomCode::parse(&signal.room_code) else {
            debug!("Dropping {:?} with bad room code {}", kind, signal.room_code);
            return false;
        };

        let sender_is_member = self
            .connections
            .binding_of(from)
            .await
            .is_some_and(|b| b.room_code == code && b.user_id == signal.user_id);
        if !sender_is_member {
            debug!(
                "Dropping {:?} from {} ({}): sender not bound to room {}",
                kind, signal.user_id, from, code
            );
            return false;
        }

        let Some(target) = self.connections.connection_for(&code, &signal.target_id).await else {
            debug!(
                "Dropping {:?} from {} to {}: target not in room {}",
                kind, signal.user_id, signal.target_id, code
            );
            return false;
        };

        let relayed = RelayedSignal {
            user_id: signal.user_id,
            target_id: signal.target_id,
            payload: signal.payload,
        };
        let message = match kind {
            SignalKind::Offer => ServerMessage::Offer(relayed),
            SignalKind::Answer => ServerMessage::Answer(relayed),
            SignalKind::IceCandidate => ServerMessage::IceCandidate(relayed),
        };
        self.connections.send_to_connection(target, message).await.is_ok()
    }
}
