use charades_core::{GameError, RoomCode};
use charades_types::{
    ClientMessage, JoinGame, LeaveGame, NoticeKind, RoomRef, SendChat, ServerMessage,
    SignalMessage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::registry::RoomRegistry;
use crate::relay::{SignalKind, SignalingRelay};
use crate::websocket::connection::{
    Binding, ConnectionError, ConnectionId, ConnectionManager,
};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    relay: Arc<SignalingRelay>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        registry: Arc<RoomRegistry>,
        relay: Arc<SignalingRelay>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            registry,
            relay,
        }
    }

    /// Handle one inbound message. Game errors are reported to the sender as
    /// notices; an `Err` means this socket can no longer be written to.
    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), ConnectionError> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::JoinGame(msg) => self.handle_join_game(msg).await,
            ClientMessage::PlayerReady(msg) => {
                let Some(code) = self.bound_as(&msg.room_code, &msg.user_id).await else {
                    return Ok(());
                };
                let result = self
                    .registry
                    .set_ready(&code, &msg.user_id, msg.is_ready)
                    .await;
                self.report(result).await
            }
            ClientMessage::StartGame(msg) => {
                let Some(binding) = self.bound_in(&msg.room_code).await else {
                    return Ok(());
                };
                let result = self
                    .registry
                    .start_game(
                        &binding.room_code,
                        &binding.user_id,
                        msg.difficulty,
                        msg.max_rounds,
                    )
                    .await;
                self.report(result).await
            }
            ClientMessage::SelectWord(msg) => {
                let Some(code) = self.bound_as(&msg.room_code, &msg.user_id).await else {
                    return Ok(());
                };
                let result = self
                    .registry
                    .select_word(&code, &msg.user_id, &msg.word)
                    .await;
                self.report(result).await
            }
            ClientMessage::SubmitGuess(msg) => {
                let Some(code) = self.bound_as(&msg.room_code, &msg.user_id).await else {
                    return Ok(());
                };
                let result = self
                    .registry
                    .submit_guess(&code, &msg.user_id, &msg.guess)
                    .await;
                self.report(result).await
            }
            ClientMessage::RequestHint(msg) => self.handle_request_hint(msg).await,
            ClientMessage::TimeUp(msg) => self.handle_time_up(msg).await,
            ClientMessage::LeaveGame(msg) => self.handle_leave_game(msg).await,
            ClientMessage::RestartGame(msg) => self.handle_restart_game(msg).await,
            ClientMessage::ChatMessage(msg) => self.handle_chat_message(msg).await,
            ClientMessage::Offer(signal) => self.handle_signal(SignalKind::Offer, signal).await,
            ClientMessage::Answer(signal) => self.handle_signal(SignalKind::Answer, signal).await,
            ClientMessage::IceCandidate(signal) => {
                self.handle_signal(SignalKind::IceCandidate, signal).await
            }
            ClientMessage::Heartbeat => Ok(()),
        }
    }

    /// Socket closed: run the leave flow if it still spoke for a player.
    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        let Some(binding) = self
            .connection_manager
            .remove_connection(self.connection_id)
            .await
        else {
            return;
        };

        if let Err(e) = self
            .registry
            .leave(&binding.room_code, &binding.user_id)
            .await
        {
            debug!(
                "Disconnect of {} from room {}: {}",
                binding.user_id, binding.room_code, e
            );
        }
    }

    /// Reply to input that did not parse. No room is touched.
    pub async fn reject_malformed(&self, reason: String) -> Result<(), ConnectionError> {
        self.send_message(ServerMessage::notice(NoticeKind::MalformedMessage, reason))
            .await
    }

    async fn handle_join_game(&self, msg: JoinGame) -> Result<(), ConnectionError> {
        let code = match RoomCode::parse(&msg.room_code) {
            Ok(code) => code,
            Err(e) => {
                return self
                    .send_message(ServerMessage::notice(
                        NoticeKind::InvalidRoomCode,
                        e.to_string(),
                    ))
                    .await;
            }
        };

        // A socket speaks for one player at a time.
        if let Some(previous) = self
            .connection_manager
            .binding_of(self.connection_id)
            .await
        {
            if previous.room_code != code || previous.user_id != msg.user_id {
                info!(
                    "Connection {} switching from {} in {} to {} in {}",
                    self.connection_id, previous.user_id, previous.room_code, msg.user_id, code
                );
                if let Err(e) = self
                    .registry
                    .leave(&previous.room_code, &previous.user_id)
                    .await
                {
                    debug!("Leaving previous room {}: {}", previous.room_code, e);
                }
            }
        }

        info!(
            "Player {} joining room {} on connection {}",
            msg.user_id, code, self.connection_id
        );
        self.registry
            .join(self.connection_id, &code, &msg.user_id, &msg.username)
            .await;
        Ok(())
    }

    async fn handle_request_hint(&self, msg: RoomRef) -> Result<(), ConnectionError> {
        let Some(binding) = self.bound_in(&msg.room_code).await else {
            return Ok(());
        };
        let result = self
            .registry
            .request_hint(&binding.room_code, &binding.user_id)
            .await;
        self.report(result).await
    }

    async fn handle_time_up(&self, msg: RoomRef) -> Result<(), ConnectionError> {
        let Some(binding) = self.bound_in(&msg.room_code).await else {
            return Ok(());
        };
        let result = self
            .registry
            .time_up(&binding.room_code, &binding.user_id)
            .await;
        self.report(result).await
    }

    async fn handle_leave_game(&self, msg: LeaveGame) -> Result<(), ConnectionError> {
        let Some(code) = self.bound_as(&msg.room_code, &msg.user_id).await else {
            return Ok(());
        };
        info!("Player {} leaving room {}", msg.user_id, code);
        let result = self.registry.leave(&code, &msg.user_id).await;
        self.report(result).await
    }

    async fn handle_restart_game(&self, msg: RoomRef) -> Result<(), ConnectionError> {
        let Some(binding) = self.bound_in(&msg.room_code).await else {
            return Ok(());
        };
        let result = self
            .registry
            .restart(&binding.room_code, &binding.user_id)
            .await;
        self.report(result).await
    }

    async fn handle_chat_message(&self, msg: SendChat) -> Result<(), ConnectionError> {
        let Some(code) = self.bound_as(&msg.room_code, &msg.user_id).await else {
            return Ok(());
        };
        let result = self.registry.chat(&code, &msg.user_id, &msg.message).await;
        self.report(result).await
    }

    async fn handle_signal(
        &self,
        kind: SignalKind,
        signal: SignalMessage,
    ) -> Result<(), ConnectionError> {
        self.relay.forward(self.connection_id, kind, signal).await;
        Ok(())
    }

    /// The room code if this socket is bound as `user_id` in `raw_code`.
    async fn bound_as(&self, raw_code: &str, user_id: &str) -> Option<RoomCode> {
        let binding = self.bound_in(raw_code).await?;
        if binding.user_id != user_id {
            debug!(
                "Dropping message from {} on connection {} bound as {}",
                user_id, self.connection_id, binding.user_id
            );
            return None;
        }
        Some(binding.room_code)
    }

    /// This socket's binding if it is for `raw_code`.
    async fn bound_in(&self, raw_code: &str) -> Option<Binding> {
        let code = RoomCode::parse(raw_code).ok()?;
        match self
            .connection_manager
            .binding_of(self.connection_id)
            .await
        {
            Some(binding) if binding.room_code == code => Some(binding),
            _ => {
                debug!(
                    "Dropping message for room {} on unbound connection {}",
                    code, self.connection_id
                );
                None
            }
        }
    }

    async fn report(&self, result: Result<(), GameError>) -> Result<(), ConnectionError> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_stale() => {
                debug!("Stale request from {}: {}", self.connection_id, e);
                Ok(())
            }
            Err(e) => {
                warn!("Rejected request from {}: {}", self.connection_id, e);
                self.send_message(ServerMessage::notice(
                    NoticeKind::InvalidState,
                    e.to_string(),
                ))
                .await
            }
        }
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), ConnectionError> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }
}
