use charades_core::{
    Effects, GameError, GameSettings, Room, RoomCode, TimerRequest, WordBank,
};
use charades_types::Difficulty;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::websocket::{ConnectionId, ConnectionManager};

/// A scheduled timer and the round number it was scheduled for.
struct RoomTimer {
    round: u32,
    handle: JoinHandle<()>,
}

impl RoomTimer {
    fn cancel(self) {
        self.handle.abort();
    }
}

/// Everything owned by one room, guarded by that room's lock.
pub struct RoomState {
    pub room: Room,
    round_clock: Option<RoomTimer>,
    next_round: Option<RoomTimer>,
    /// Set when the room is removed from the registry. A task that was
    /// waiting on the lock at that moment must look the code up again.
    closed: bool,
}

impl RoomState {
    fn new(room: Room) -> Self {
        Self {
            room,
            round_clock: None,
            next_round: None,
            closed: false,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.round_clock.take() {
            timer.cancel();
        }
        if let Some(timer) = self.next_round.take() {
            timer.cancel();
        }
    }
}

pub type SharedRoom = Arc<Mutex<RoomState>>;
type RoomGuard = OwnedMutexGuard<RoomState>;

/// Process-wide map from room code to room. Each room is locked on its own;
/// different rooms never contend.
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, SharedRoom>,
    settings: GameSettings,
    word_bank: Arc<dyn WordBank>,
    connections: Arc<ConnectionManager>,
}

impl RoomRegistry {
    pub fn new(
        settings: GameSettings,
        word_bank: Arc<dyn WordBank>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            settings,
            word_bank,
            connections,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Existing room for `code`, or a new empty lobby. Never fails on an
    /// existing code: the first join defines the room.
    pub fn create_or_get_room(&self, code: &RoomCode) -> SharedRoom {
        self.rooms
            .entry(code.clone())
            .or_insert_with(|| {
                info!("Creating room {}", code);
                Arc::new(Mutex::new(RoomState::new(Room::new(
                    code.clone(),
                    self.settings.clone(),
                ))))
            })
            .clone()
    }

    /// Lock the room for `code`, creating it if needed.
    async fn enter_or_create(&self, code: &RoomCode) -> RoomGuard {
        loop {
            let guard = self.create_or_get_room(code).lock_owned().await;
            if !guard.closed {
                return guard;
            }
        }
    }

    /// Lock the room for `code` if it exists.
    async fn enter(&self, code: &RoomCode) -> Option<RoomGuard> {
        let room = self.rooms.get(code).map(|entry| entry.value().clone())?;
        let guard = room.lock_owned().await;
        (!guard.closed).then_some(guard)
    }

    /// Deletes the room once nobody is left in it. Returns true if removed.
    pub async fn remove_room_if_empty(&self, code: &RoomCode) -> bool {
        match self.enter(code).await {
            Some(mut guard) => self.close_if_empty(&mut guard),
            None => false,
        }
    }

    fn close_if_empty(&self, guard: &mut RoomGuard) -> bool {
        if !guard.room.is_empty() {
            return false;
        }
        guard.closed = true;
        guard.cancel_timers();
        let handle = OwnedMutexGuard::mutex(guard).clone();
        let code = guard.room.code().clone();
        self.rooms
            .remove_if(&code, |_, current| Arc::ptr_eq(current, &handle));
        info!("Room {} is empty and was removed", code);
        true
    }

    /// Unused code for a new room.
    pub fn generate_room_code(&self) -> RoomCode {
        loop {
            let code = RoomCode::generate();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub async fn player_count(&self, code: &RoomCode) -> Option<usize> {
        let guard = self.enter(code).await?;
        Some(guard.room.player_count())
    }

    /// Run `transition` under the room lock and carry out its effects.
    async fn transition<F>(
        self: &Arc<Self>,
        code: &RoomCode,
        transition: F,
    ) -> Result<(), GameError>
    where
        F: FnOnce(&mut Room, &dyn WordBank, std::time::Instant) -> Result<Effects, GameError>,
    {
        let mut guard = self.enter(code).await.ok_or_else(|| GameError::RoomNotFound {
            code: code.to_string(),
        })?;
        let effects = transition(&mut guard.room, self.word_bank.as_ref(), now())?;
        self.apply(&mut guard, effects).await;
        self.close_if_empty(&mut guard);
        Ok(())
    }

    /// Join (or rejoin) `code` as `user_id` on `connection_id`, creating the
    /// room if it does not exist yet.
    pub async fn join(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        code: &RoomCode,
        user_id: &str,
        username: &str,
    ) {
        let mut guard = self.enter_or_create(code).await;
        match self.connections.bind(connection_id, code, user_id).await {
            Ok(Some(displaced)) => {
                info!(
                    "Player {} moved from connection {} to {}",
                    user_id, displaced, connection_id
                );
            }
            Ok(None) => {}
            Err(e) => {
                // Socket already gone; nobody to join.
                debug!("Join from closed connection {}: {}", connection_id, e);
                self.close_if_empty(&mut guard);
                return;
            }
        }
        let effects = guard.room.join(user_id, username, now());
        self.apply(&mut guard, effects).await;
    }

    pub async fn set_ready(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
        is_ready: bool,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, _| room.set_ready(user_id, is_ready))
            .await
    }

    pub async fn start_game(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
        difficulty: Difficulty,
        max_rounds: Option<u32>,
    ) -> Result<(), GameError> {
        self.transition(code, |room, bank, _| {
            room.start(user_id, difficulty, max_rounds, bank)
        })
        .await
    }

    pub async fn select_word(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
        word: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, now| room.select_word(user_id, word, now))
            .await
    }

    pub async fn submit_guess(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
        guess: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, now| room.submit_guess(user_id, guess, now))
            .await
    }

    pub async fn request_hint(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, _| room.request_hint(user_id))
            .await
    }

    pub async fn time_up(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, now| room.client_time_up(user_id, now))
            .await
    }

    pub async fn restart(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, now| room.restart(user_id, now))
            .await
    }

    pub async fn chat(
        self: &Arc<Self>,
        code: &RoomCode,
        user_id: &str,
        message: &str,
    ) -> Result<(), GameError> {
        self.transition(code, |room, _, _| room.chat(user_id, message))
            .await
    }

    /// Remove a player (explicit leave, disconnect or idle cleanup). Destroys
    /// the room when it becomes empty.
    pub async fn leave(self: &Arc<Self>, code: &RoomCode, user_id: &str) -> Result<(), GameError> {
        let mut guard = self.enter(code).await.ok_or_else(|| GameError::RoomNotFound {
            code: code.to_string(),
        })?;
        let effects = guard.room.leave(user_id, self.word_bank.as_ref())?;
        self.connections.unbind(code, user_id).await;
        self.apply(&mut guard, effects).await;
        self.close_if_empty(&mut guard);
        Ok(())
    }

    fn fire_round_clock(self: Arc<Self>, code: RoomCode, round: u32) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let Some(mut guard) = self.enter(&code).await else {
                debug!("Round clock fired for removed room {}", code);
                return;
            };
            // Detach our own handle so the cancel inside the effects does not
            // abort this task halfway through delivery.
            if guard.round_clock.as_ref().is_some_and(|t| t.round == round) {
                guard.round_clock = None;
            }
            let effects = guard.room.expire_round(round);
            self.apply(&mut guard, effects).await;
        })
    }

    fn fire_next_round(self: Arc<Self>, code: RoomCode, round: u32) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let Some(mut guard) = self.enter(&code).await else {
                debug!("Next-round timer fired for removed room {}", code);
                return;
            };
            if guard.next_round.as_ref().is_some_and(|t| t.round == round) {
                guard.next_round = None;
            }
            let effects = guard.room.begin_next_round(round, self.word_bank.as_ref());
            self.apply(&mut guard, effects).await;
        })
    }

    /// Deliver messages to the room's current members and (re)arm timers.
    async fn apply(self: &Arc<Self>, guard: &mut RoomGuard, effects: Effects) {
        let code = guard.room.code().clone();

        for dispatch in effects.dispatches {
            let recipients: Vec<String> = guard
                .room
                .player_ids()
                .iter()
                .filter(|id| dispatch.audience.includes(id))
                .cloned()
                .collect();
            for user_id in recipients {
                if let Err(e) = self
                    .connections
                    .send_to_player(&code, &user_id, dispatch.message.clone())
                    .await
                {
                    debug!(
                        "Could not deliver {} to {} in room {}: {}",
                        dispatch.message.event_name(),
                        user_id,
                        code,
                        e
                    );
                }
            }
        }

        for timer in effects.timers {
            match timer {
                TimerRequest::RoundClock { round, after } => {
                    if let Some(old) = guard.round_clock.take() {
                        old.cancel();
                    }
                    let handle =
                        spawn_timer(after, self.clone().fire_round_clock(code.clone(), round));
                    guard.round_clock = Some(RoomTimer { round, handle });
                }
                TimerRequest::CancelRoundClock => {
                    if let Some(old) = guard.round_clock.take() {
                        old.cancel();
                    }
                }
                TimerRequest::NextRound { round, after } => {
                    if let Some(old) = guard.next_round.take() {
                        old.cancel();
                    }
                    let handle =
                        spawn_timer(after, self.clone().fire_next_round(code.clone(), round));
                    guard.next_round = Some(RoomTimer { round, handle });
                }
                TimerRequest::CancelNextRound => {
                    if let Some(old) = guard.next_round.take() {
                        old.cancel();
                    }
                }
            }
        }
    }

    /// Ids currently in `code`, in join order.
    pub async fn members(&self, code: &RoomCode) -> Vec<String> {
        match self.enter(code).await {
            Some(guard) => guard.room.player_ids().to_vec(),
            None => Vec::new(),
        }
    }

    /// Runs the leave flow for every binding released by idle cleanup.
    pub async fn evict_idle(self: &Arc<Self>, timeout: Duration) -> usize {
        let released = self.connections.cleanup_inactive_connections(timeout).await;
        let count = released.len();
        for binding in released {
            if let Err(e) = self.leave(&binding.room_code, &binding.user_id).await {
                warn!(
                    "Idle cleanup for {} in room {} failed: {}",
                    binding.user_id, binding.room_code, e
                );
            }
        }
        count
    }
}

fn spawn_timer(after: Duration, fire: BoxFuture<'static, ()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        fire.await;
    })
}

/// Tokio's clock, so paused-time tests drive round math too.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
