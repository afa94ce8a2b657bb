use async_trait::async_trait;
use charades_types::{ClientMessage, PlayerId, RelayedSignal, ServerMessage, SignalMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::coordinator::{MeshAction, MeshCoordinator, TransportState};
use crate::errors::MeshError;

/// The local peer-connection stack. Payloads are whatever the stack produces;
/// they travel through the relay untouched.
#[async_trait]
pub trait MediaEngine: Send {
    /// Create a connection to `peer` and return the offer to send.
    async fn create_offer(&mut self, peer: &str) -> Result<Value, MeshError>;
    /// Create a connection from a remote offer and return the answer to send.
    async fn accept_offer(&mut self, peer: &str, offer: Value) -> Result<Value, MeshError>;
    async fn apply_answer(&mut self, peer: &str, answer: Value) -> Result<(), MeshError>;
    async fn add_candidate(&mut self, peer: &str, candidate: Value) -> Result<(), MeshError>;
    async fn close(&mut self, peer: &str);
}

/// Notifications raised by the media layer.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LocalCandidate { peer: PlayerId, candidate: Value },
    StateChanged { peer: PlayerId, state: TransportState },
}

/// Runs one client's side of the mesh: feeds room membership and relayed
/// signals into the coordinator and carries out its decisions.
pub struct MeshDriver<E: MediaEngine> {
    room_code: String,
    coordinator: MeshCoordinator,
    engine: E,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    reconnect_tx: mpsc::UnboundedSender<PlayerId>,
    reconnect_rx: mpsc::UnboundedReceiver<PlayerId>,
}

impl<E: MediaEngine> MeshDriver<E> {
    pub fn new(
        room_code: impl Into<String>,
        coordinator: MeshCoordinator,
        engine: E,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        Self {
            room_code: room_code.into(),
            coordinator,
            engine,
            outbound,
            reconnect_tx,
            reconnect_rx,
        }
    }

    pub fn coordinator(&self) -> &MeshCoordinator {
        &self.coordinator
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Process events until the server channel closes.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<ServerMessage>,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
    ) -> Result<Self, MeshError> {
        let period = self.coordinator.settings().sweep_interval;
        let mut sweep = time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Mesh driver for {} started in room {}",
            self.coordinator.local_id(),
            self.room_code
        );

        loop {
            tokio::select! {
                message = inbound.recv() => {
                    match message {
                        Some(message) => self.handle_server_message(message).await?,
                        None => break,
                    }
                }
                Some(event) = media_events.recv() => {
                    self.handle_media_event(event).await?;
                }
                Some(peer) = self.reconnect_rx.recv() => {
                    let actions = self.coordinator.reconnect_due(&peer, now());
                    self.execute(actions).await?;
                }
                _ = sweep.tick() => {
                    let actions = self.coordinator.health_sweep(now());
                    self.execute(actions).await?;
                }
            }
        }

        info!("Mesh driver for {} stopped", self.coordinator.local_id());
        Ok(self)
    }

    pub async fn handle_server_message(&mut self, message: ServerMessage) -> Result<(), MeshError> {
        let now = now();
        let actions = match message {
            ServerMessage::GameState(snapshot) => self
                .coordinator
                .sync_peers(snapshot.players.iter().map(|p| p.user_id.as_str()), now),
            ServerMessage::PlayerJoined(joined) => self
                .coordinator
                .sync_peers(joined.players.iter().map(|p| p.user_id.as_str()), now),
            ServerMessage::PlayerLeft(left) => self
                .coordinator
                .sync_peers(left.players.iter().map(|p| p.user_id.as_str()), now),
            ServerMessage::Offer(signal) => match self.addressed_to_us(signal) {
                Some((from, payload)) => self.coordinator.offer_received(&from, payload, now),
                None => Vec::new(),
            },
            ServerMessage::Answer(signal) => match self.addressed_to_us(signal) {
                Some((from, payload)) => self.coordinator.answer_received(&from, payload, now),
                None => Vec::new(),
            },
            ServerMessage::IceCandidate(signal) => match self.addressed_to_us(signal) {
                Some((from, payload)) => self.coordinator.candidate_received(&from, payload),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        self.execute(actions).await
    }

    fn addressed_to_us(&self, signal: RelayedSignal) -> Option<(PlayerId, Value)> {
        if signal.target_id != self.coordinator.local_id() {
            debug!("Dropping signal addressed to {}", signal.target_id);
            return None;
        }
        Some((signal.user_id, signal.payload))
    }

    pub async fn handle_media_event(&mut self, event: MediaEvent) -> Result<(), MeshError> {
        match event {
            MediaEvent::LocalCandidate { peer, candidate } => {
                if self.coordinator.link_state(&peer).is_some() {
                    self.send(ClientMessage::IceCandidate(self.signal(&peer, candidate)))?;
                }
                Ok(())
            }
            MediaEvent::StateChanged { peer, state } => {
                let actions = self.coordinator.transport_changed(&peer, state);
                self.execute(actions).await
            }
        }
    }

    fn signal(&self, target: &str, payload: Value) -> SignalMessage {
        SignalMessage {
            room_code: self.room_code.clone(),
            user_id: self.coordinator.local_id().to_string(),
            target_id: target.to_string(),
            payload,
        }
    }

    fn send(&self, message: ClientMessage) -> Result<(), MeshError> {
        self.outbound
            .send(message)
            .map_err(|_| MeshError::SignalingClosed)
    }

    async fn execute(&mut self, actions: Vec<MeshAction>) -> Result<(), MeshError> {
        let mut pending = std::collections::VecDeque::from(actions);
        while let Some(action) = pending.pop_front() {
            match action {
                MeshAction::CreateOffer { peer } => match self.engine.create_offer(&peer).await {
                    Ok(offer) => self.send(ClientMessage::Offer(self.signal(&peer, offer)))?,
                    Err(e) => pending.extend(self.media_failed(&peer, e)),
                },
                MeshAction::AcceptOffer { peer, offer } => {
                    match self.engine.accept_offer(&peer, offer).await {
                        Ok(answer) => {
                            self.send(ClientMessage::Answer(self.signal(&peer, answer)))?
                        }
                        Err(e) => pending.extend(self.media_failed(&peer, e)),
                    }
                }
                MeshAction::ApplyAnswer { peer, answer } => {
                    if let Err(e) = self.engine.apply_answer(&peer, answer).await {
                        pending.extend(self.media_failed(&peer, e));
                    }
                }
                MeshAction::AddCandidate { peer, candidate } => {
                    // A bad candidate alone does not doom the link.
                    if let Err(e) = self.engine.add_candidate(&peer, candidate).await {
                        warn!("Failed to add candidate from {}: {}", peer, e);
                    }
                }
                MeshAction::Close { peer } => self.engine.close(&peer).await,
                MeshAction::ScheduleReconnect { peer, after } => {
                    let reconnect_tx = self.reconnect_tx.clone();
                    tokio::spawn(async move {
                        time::sleep(after).await;
                        let _ = reconnect_tx.send(peer);
                    });
                }
            }
        }
        Ok(())
    }

    fn media_failed(&mut self, peer: &str, error: MeshError) -> Vec<MeshAction> {
        warn!("Media error for peer {}: {}", peer, error);
        self.coordinator.transport_changed(peer, TransportState::Failed)
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}
