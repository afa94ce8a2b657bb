use charades_types::{
    ChatLine, CorrectGuess, Difficulty, FinalResults, GameOver, GameSnapshot, GameStarted,
    GuessMade, Hint, LeaderboardEntry, NextRound, PlayerId, PlayerInfo, PlayerJoined, PlayerLeft,
    PlayerReadyUpdate, RoomPhase, RoundEnded, RoundRecord, RoundStarted, ServerMessage,
    WordChoices, YourWord,
};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::round::{Round, WordSelection};
use crate::scoring::{Standing, rank_standings};
use crate::settings::MIN_PLAYERS;
use crate::{
    Audience, Effects, GameError, GameSettings, RoomCode, TimerRequest, WordBank, guess_matches,
};

#[derive(Debug, Clone)]
struct Player {
    user_id: PlayerId,
    username: String,
    score: u32,
    is_ready: bool,
    is_connected: bool,
}

impl Player {
    fn new(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            score: 0,
            is_ready: false,
            is_connected: true,
        }
    }

    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            score: self.score,
            is_ready: self.is_ready,
            is_connected: self.is_connected,
        }
    }
}

/// One game session. Every method is a complete transition: it either fails
/// with no state change or returns the messages and timer requests it caused.
///
/// The room is not internally synchronized; the caller serializes access.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    settings: GameSettings,
    phase: RoomPhase,
    players: HashMap<PlayerId, Player>,
    /// Stable join order. Rejoining after a leave appends at the end.
    join_order: Vec<PlayerId>,
    /// Index into `join_order` of the current actor.
    actor_cursor: usize,
    /// The actor left; the player now at `actor_cursor` is next.
    actor_departed: bool,
    actor_id: Option<PlayerId>,
    round_number: u32,
    max_rounds: u32,
    difficulty: Difficulty,
    selection: Option<WordSelection>,
    round: Option<Round>,
    history: Vec<RoundRecord>,
    used_words: HashSet<String>,
}

impl Room {
    pub fn new(code: RoomCode, settings: GameSettings) -> Self {
        Self {
            code,
            settings,
            phase: RoomPhase::Lobby,
            players: HashMap::new(),
            join_order: Vec::new(),
            actor_cursor: 0,
            actor_departed: false,
            actor_id: None,
            round_number: 0,
            max_rounds: 0,
            difficulty: Difficulty::default(),
            selection: None,
            round: None,
            history: Vec::new(),
            used_words: HashSet::new(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn score_of(&self, player_id: &str) -> Option<u32> {
        self.players.get(player_id).map(|p| p.score)
    }

    /// Player ids in stable join order.
    pub fn player_ids(&self) -> &[PlayerId] {
        &self.join_order
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        rank_standings(self.join_order.iter().filter_map(|id| self.players.get(id)).map(|p| {
            Standing {
                user_id: &p.user_id,
                username: &p.username,
                score: p.score,
            }
        }))
    }

    fn player_infos(&self) -> Vec<PlayerInfo> {
        self.join_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(Player::info)
            .collect()
    }

    fn player(&self, player_id: &str) -> Result<&Player, GameError> {
        self.players
            .get(player_id)
            .ok_or_else(|| GameError::PlayerNotInRoom {
                player_id: player_id.to_string(),
            })
    }

    fn require_phase(&self, expected: RoomPhase) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::WrongPhase { actual: self.phase })
        }
    }

    fn non_actors(&self) -> Vec<PlayerId> {
        self.join_order
            .iter()
            .filter(|id| self.actor_id.as_deref() != Some(id.as_str()))
            .cloned()
            .collect()
    }

    fn username_of(&self, player_id: &str) -> String {
        self.players
            .get(player_id)
            .map(|p| p.username.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Full state as seen by `viewer`. The literal word is only included for
    /// the actor while the round is running, and for everyone once revealed.
    pub fn snapshot_for(&self, viewer: &str, now: Instant, is_mid_game_join: bool) -> GameSnapshot {
        let mut snapshot = GameSnapshot {
            room_code: self.code.to_string(),
            phase: self.phase,
            players: self.player_infos(),
            leaderboard: self.leaderboard(),
            actor_id: self.actor_id.clone(),
            current_round: self.round_number,
            max_rounds: self.max_rounds,
            difficulty: self.difficulty,
            category: None,
            word_length: None,
            word: None,
            hint: None,
            remaining_seconds: None,
            is_mid_game_join,
        };

        if let Some(round) = &self.round {
            match self.phase {
                RoomPhase::RoundActive => {
                    snapshot.category = Some(round.category.clone());
                    snapshot.word_length = Some(round.word_length());
                    snapshot.remaining_seconds = Some(round.remaining(now).as_secs() as u32);
                    if round.hints_used() > 0 {
                        snapshot.hint = Some(round.masked_word());
                    }
                    if round.actor_id == viewer {
                        snapshot.word = Some(round.word.clone());
                    }
                }
                RoomPhase::RoundReveal => {
                    snapshot.category = Some(round.category.clone());
                    snapshot.word_length = Some(round.word_length());
                    snapshot.word = Some(round.word.clone());
                }
                _ => {}
            }
        }

        snapshot
    }

    /// Add a player, or refresh one that is already present (same tab
    /// reconnecting). Joining outside the lobby is a mid-game join.
    pub fn join(&mut self, user_id: &str, username: &str, now: Instant) -> Effects {
        let username = match username.trim() {
            "" => default_username(user_id),
            name => name.to_string(),
        };
        let is_mid_game_join = self.phase.is_in_game();

        let is_reconnect = match self.players.get_mut(user_id) {
            Some(existing) => {
                existing.username = username.clone();
                existing.is_connected = true;
                true
            }
            None => {
                self.players
                    .insert(user_id.to_string(), Player::new(user_id, &username));
                self.join_order.push(user_id.to_string());
                false
            }
        };

        info!(
            "Player {} ({}) joined room {} during {}{}. Total players: {}",
            username,
            user_id,
            self.code,
            self.phase,
            if is_reconnect { " (reconnect)" } else { "" },
            self.players.len()
        );

        let mut effects = Effects::new();
        effects.to_player(
            user_id,
            ServerMessage::GameState(self.snapshot_for(user_id, now, is_mid_game_join)),
        );
        if let Some(selection) = &self.selection {
            if selection.actor_id == user_id {
                effects.to_player(
                    user_id,
                    ServerMessage::WordChoices(WordChoices {
                        round_number: selection.round,
                        words: selection.choices.clone(),
                    }),
                );
            }
        }
        effects.send(
            Audience::EveryoneExcept(user_id.to_string()),
            ServerMessage::PlayerJoined(PlayerJoined {
                user_id: user_id.to_string(),
                username,
                players: self.player_infos(),
                leaderboard: self.leaderboard(),
                is_mid_game_join,
            }),
        );
        effects
    }

    pub fn set_ready(&mut self, user_id: &str, is_ready: bool) -> Result<Effects, GameError> {
        self.player(user_id)?;
        self.require_phase(RoomPhase::Lobby)?;

        if let Some(player) = self.players.get_mut(user_id) {
            player.is_ready = is_ready;
        }
        let all_ready = self.players.values().all(|p| p.is_ready);

        let mut effects = Effects::new();
        effects.broadcast(ServerMessage::PlayerReadyUpdate(PlayerReadyUpdate {
            user_id: user_id.to_string(),
            is_ready,
            all_ready,
        }));
        Ok(effects)
    }

    /// Lobby → RoundSelecting. Needs at least two players, all ready. The first
    /// actor is the earliest joiner.
    pub fn start(
        &mut self,
        requested_by: &str,
        difficulty: Difficulty,
        max_rounds: Option<u32>,
        word_bank: &dyn WordBank,
    ) -> Result<Effects, GameError> {
        self.player(requested_by)?;
        self.require_phase(RoomPhase::Lobby)?;
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                needed: MIN_PLAYERS,
                present: self.players.len(),
            });
        }
        if !self.players.values().all(|p| p.is_ready) {
            return Err(GameError::PlayersNotReady);
        }

        let choices = word_bank.pick(difficulty, self.settings.word_choices, &HashSet::new());
        if choices.is_empty() {
            return Err(GameError::WordBankExhausted {
                difficulty: difficulty.to_string(),
            });
        }

        let player_count = self.players.len() as u32;
        self.difficulty = difficulty;
        self.max_rounds = max_rounds
            .filter(|rounds| *rounds > 0)
            .unwrap_or(player_count * self.settings.rounds_per_player.max(1));
        self.round_number = 1;
        self.history.clear();
        self.used_words.clear();
        for player in self.players.values_mut() {
            player.score = 0;
        }
        self.actor_cursor = 0;
        self.actor_departed = false;
        let actor_id = self.join_order[0].clone();
        self.actor_id = Some(actor_id.clone());
        self.selection = Some(WordSelection {
            round: self.round_number,
            actor_id: actor_id.clone(),
            choices: choices.clone(),
        });
        self.round = None;
        self.phase = RoomPhase::RoundSelecting;

        info!(
            "Game started in room {} ({}, {} rounds, first actor {})",
            self.code, difficulty, self.max_rounds, actor_id
        );

        let mut effects = Effects::new();
        effects.broadcast(ServerMessage::GameStarted(GameStarted {
            actor_id: actor_id.clone(),
            round_number: self.round_number,
            max_rounds: self.max_rounds,
            difficulty,
            leaderboard: self.leaderboard(),
        }));
        effects.to_player(
            &actor_id,
            ServerMessage::WordChoices(WordChoices {
                round_number: self.round_number,
                words: choices,
            }),
        );
        Ok(effects)
    }

    /// RoundSelecting → RoundActive. Only the actor, only an offered word.
    pub fn select_word(
        &mut self,
        user_id: &str,
        word: &str,
        now: Instant,
    ) -> Result<Effects, GameError> {
        self.player(user_id)?;
        self.require_phase(RoomPhase::RoundSelecting)?;
        if self.actor_id.as_deref() != Some(user_id) {
            return Err(GameError::NotActor);
        }
        let choice = self
            .selection
            .as_ref()
            .and_then(|selection| selection.find(word))
            .cloned()
            .ok_or_else(|| GameError::WordNotOffered {
                word: word.to_string(),
            })?;

        let actor_name = self.username_of(user_id);
        let round = Round::new(
            self.round_number,
            (user_id, &actor_name),
            &choice,
            now,
            self.settings.round_duration,
        );
        self.used_words.insert(choice.word.to_lowercase());
        self.selection = None;
        self.phase = RoomPhase::RoundActive;

        info!(
            "Round {} started in room {} (category {}, {} letters)",
            round.number,
            self.code,
            round.category,
            round.word_length()
        );
        debug!("Room {} round {} word: {}", self.code, round.number, round.word);

        let mut effects = Effects::new();
        effects.broadcast(ServerMessage::RoundStarted(RoundStarted {
            round_number: round.number,
            actor_id: user_id.to_string(),
            category: round.category.clone(),
            word_length: round.word_length(),
            duration_seconds: round.duration.as_secs() as u32,
        }));
        effects.to_player(
            user_id,
            ServerMessage::YourWord(YourWord {
                word: round.word.clone(),
                category: round.category.clone(),
            }),
        );
        effects.schedule(TimerRequest::RoundClock {
            round: round.number,
            after: round.duration,
        });
        self.round = Some(round);
        Ok(effects)
    }

    /// Score a guess. Every guess is chat; the first correct one per player
    /// scores, and the round ends as soon as every non-actor has it.
    pub fn submit_guess(
        &mut self,
        user_id: &str,
        guess: &str,
        now: Instant,
    ) -> Result<Effects, GameError> {
        let username = self.player(user_id)?.username.clone();
        self.require_phase(RoomPhase::RoundActive)?;
        if guess.trim().is_empty() {
            return Ok(Effects::new());
        }
        let Some(round) = self.round.as_mut() else {
            return Err(GameError::WrongPhase { actual: self.phase });
        };
        if round.actor_id == user_id {
            return Err(GameError::ActorCannotGuess);
        }

        round.record_guess();
        let is_match = guess_matches(guess, &round.word);
        let chat = ServerMessage::GuessMade(GuessMade {
            user_id: user_id.to_string(),
            username: username.clone(),
            guess: guess.to_string(),
        });

        let mut effects = Effects::new();
        if round.has_guessed(user_id) {
            if is_match {
                // Only people who already know the word see it repeated.
                let mut insiders = vec![round.actor_id.clone()];
                insiders.extend(round.correct_guessers().iter().cloned());
                effects.send(Audience::Players(insiders), chat);
            } else {
                effects.broadcast(chat);
            }
            return Ok(effects);
        }
        if !is_match {
            effects.broadcast(chat);
            return Ok(effects);
        }

        round.record_correct(user_id);
        let points = self
            .settings
            .scoring
            .guess_points(round.elapsed(now), round.duration);
        let actor_bonus = round.take_actor_bonus().then(|| round.actor_id.clone());

        if let Some(player) = self.players.get_mut(user_id) {
            player.score = player.score.saturating_add(points);
        }
        if let Some(actor_id) = actor_bonus {
            if let Some(actor) = self.players.get_mut(&actor_id) {
                actor.score = actor.score.saturating_add(self.settings.scoring.actor_bonus);
            }
        }

        info!(
            "Player {} guessed the word in room {} (+{} points)",
            user_id, self.code, points
        );
        effects.broadcast(ServerMessage::CorrectGuess(CorrectGuess {
            user_id: user_id.to_string(),
            username,
            points,
            leaderboard: self.leaderboard(),
        }));

        if self.everyone_guessed() {
            effects.extend(self.end_round());
        }
        Ok(effects)
    }

    fn everyone_guessed(&self) -> bool {
        let Some(round) = &self.round else {
            return false;
        };
        let non_actors = self.non_actors();
        !non_actors.is_empty() && non_actors.iter().all(|id| round.has_guessed(id))
    }

    /// Reveal one more letter to everyone except the actor.
    pub fn request_hint(&mut self, user_id: &str) -> Result<Effects, GameError> {
        self.player(user_id)?;
        self.require_phase(RoomPhase::RoundActive)?;
        if self.actor_id.as_deref() == Some(user_id) {
            return Err(GameError::ActorCannotRequestHint);
        }
        let audience = self.non_actors();
        let round = self
            .round
            .as_mut()
            .ok_or(GameError::WrongPhase { actual: self.phase })?;
        let hint = round.reveal_next_letter().ok_or(GameError::NoHintsLeft)?;

        let mut effects = Effects::new();
        effects.send(
            Audience::Players(audience),
            ServerMessage::Hint(Hint {
                hint,
                revealed: round.hints_used(),
            }),
        );
        Ok(effects)
    }

    /// Round clock fired. Stale firings (round already over, or a later round)
    /// do nothing.
    pub fn expire_round(&mut self, round: u32) -> Effects {
        if self.phase != RoomPhase::RoundActive || self.round_number != round {
            debug!(
                "Ignoring stale round clock for round {} in room {} ({}, round {})",
                round, self.code, self.phase, self.round_number
            );
            return Effects::new();
        }
        info!("Round {} timed out in room {}", round, self.code);
        self.end_round()
    }

    /// A client reports the clock ran out. Honoured only once the server-side
    /// deadline has actually passed.
    pub fn client_time_up(&mut self, user_id: &str, now: Instant) -> Result<Effects, GameError> {
        self.player(user_id)?;
        let Some(round) = self
            .round
            .as_ref()
            .filter(|_| self.phase == RoomPhase::RoundActive)
        else {
            return Ok(Effects::new());
        };
        if now + self.settings.time_up_tolerance < round.deadline() {
            debug!(
                "Early time-up from {} in room {} ignored ({:?} left)",
                user_id,
                self.code,
                round.remaining(now)
            );
            return Ok(Effects::new());
        }
        let round = round.number;
        Ok(self.expire_round(round))
    }

    /// RoundActive → RoundReveal, then either GameOver or a scheduled next round.
    fn end_round(&mut self) -> Effects {
        let mut effects = Effects::new();
        let Some(round) = self.round.as_ref() else {
            return effects;
        };
        self.phase = RoomPhase::RoundReveal;
        effects.schedule(TimerRequest::CancelRoundClock);

        let summary = round.summary();
        self.history.push(round.record());
        let game_ended =
            self.round_number >= self.max_rounds || self.players.len() < MIN_PLAYERS;

        info!(
            "Round {} ended in room {}: {} correct guessers",
            summary.round_number,
            self.code,
            summary.correct_guessers.len()
        );
        effects.broadcast(ServerMessage::RoundEnded(RoundEnded {
            word: round.word.clone(),
            category: round.category.clone(),
            summary,
            leaderboard: self.leaderboard(),
            game_ended,
        }));

        if game_ended {
            effects.extend(self.finish_game());
        } else {
            effects.schedule(TimerRequest::NextRound {
                round: self.round_number,
                after: self.settings.reveal_delay,
            });
        }
        effects
    }

    fn finish_game(&mut self) -> Effects {
        self.phase = RoomPhase::GameOver;
        self.actor_id = None;
        self.selection = None;

        let leaderboard = self.leaderboard();
        let results = FinalResults {
            winner: leaderboard.first().cloned(),
            leaderboard,
            total_rounds: self.history.len() as u32,
            round_history: self.history.clone(),
        };
        info!(
            "Game over in room {} after {} rounds. Winner: {:?}",
            self.code,
            results.total_rounds,
            results.winner.as_ref().map(|w| &w.username)
        );

        let mut effects = Effects::new();
        effects.schedule(TimerRequest::CancelRoundClock);
        effects.schedule(TimerRequest::CancelNextRound);
        effects.broadcast(ServerMessage::GameOver(GameOver { results }));
        effects
    }

    /// Move the actor cursor to the next player in join order.
    fn rotate_actor(&mut self) -> Option<PlayerId> {
        let count = self.join_order.len();
        if count == 0 {
            self.actor_id = None;
            return None;
        }
        self.actor_cursor = if self.actor_departed {
            self.actor_cursor % count
        } else {
            (self.actor_cursor + 1) % count
        };
        self.actor_departed = false;
        let actor_id = self.join_order[self.actor_cursor].clone();
        self.actor_id = Some(actor_id.clone());
        Some(actor_id)
    }

    /// Offer words to the current actor for the current round number.
    fn offer_words(&mut self, word_bank: &dyn WordBank) -> Option<WordSelection> {
        let actor_id = self.actor_id.clone()?;
        let mut choices =
            word_bank.pick(self.difficulty, self.settings.word_choices, &self.used_words);
        if choices.is_empty() {
            warn!(
                "Room {} used every {} word, allowing repeats",
                self.code, self.difficulty
            );
            choices = word_bank.pick(self.difficulty, self.settings.word_choices, &HashSet::new());
        }
        if choices.is_empty() {
            return None;
        }
        Some(WordSelection {
            round: self.round_number,
            actor_id,
            choices,
        })
    }

    fn enter_selection(&mut self, word_bank: &dyn WordBank) -> Effects {
        let Some(selection) = self.offer_words(word_bank) else {
            warn!("Room {} has no words to offer, ending game", self.code);
            return self.finish_game();
        };
        self.round = None;
        self.phase = RoomPhase::RoundSelecting;

        let mut effects = Effects::new();
        effects.broadcast(ServerMessage::NextRound(NextRound {
            actor_id: selection.actor_id.clone(),
            round_number: self.round_number,
            max_rounds: self.max_rounds,
            leaderboard: self.leaderboard(),
        }));
        effects.to_player(
            &selection.actor_id,
            ServerMessage::WordChoices(WordChoices {
                round_number: selection.round,
                words: selection.choices.clone(),
            }),
        );
        self.selection = Some(selection);
        effects
    }

    /// Reveal delay elapsed: rotate the actor and offer fresh words. Stale
    /// firings do nothing.
    pub fn begin_next_round(&mut self, round: u32, word_bank: &dyn WordBank) -> Effects {
        if self.phase != RoomPhase::RoundReveal || self.round_number != round {
            debug!(
                "Ignoring stale next-round timer for round {} in room {} ({}, round {})",
                round, self.code, self.phase, self.round_number
            );
            return Effects::new();
        }
        if self.rotate_actor().is_none() {
            return Effects::new();
        }
        self.round_number += 1;
        info!(
            "Room {} moving to round {} with actor {:?}",
            self.code, self.round_number, self.actor_id
        );
        self.enter_selection(word_bank)
    }

    /// Remove a player. A departing actor ends the running round at once, and a
    /// game left with fewer than two players is over.
    pub fn leave(&mut self, user_id: &str, word_bank: &dyn WordBank) -> Result<Effects, GameError> {
        self.player(user_id)?;
        self.players.remove(user_id);
        if let Some(index) = self.join_order.iter().position(|id| id == user_id) {
            self.join_order.remove(index);
            if index < self.actor_cursor {
                self.actor_cursor -= 1;
            } else if index == self.actor_cursor && self.phase.is_in_game() {
                self.actor_departed = true;
            }
        }
        let was_actor = self.actor_id.as_deref() == Some(user_id);
        if was_actor {
            self.actor_id = None;
        }

        info!(
            "Player {} left room {} during {}. Remaining players: {}",
            user_id,
            self.code,
            self.phase,
            self.players.len()
        );

        let mut effects = Effects::new();
        effects.broadcast(ServerMessage::PlayerLeft(PlayerLeft {
            user_id: user_id.to_string(),
            players: self.player_infos(),
            leaderboard: self.leaderboard(),
        }));

        if self.players.is_empty() {
            effects.schedule(TimerRequest::CancelRoundClock);
            effects.schedule(TimerRequest::CancelNextRound);
            return Ok(effects);
        }

        let too_few = self.players.len() < MIN_PLAYERS;
        match self.phase {
            RoomPhase::RoundActive => {
                if was_actor || too_few || self.everyone_guessed() {
                    effects.extend(self.end_round());
                }
            }
            RoomPhase::RoundSelecting => {
                if too_few {
                    effects.extend(self.finish_game());
                } else if was_actor {
                    self.rotate_actor();
                    effects.extend(self.enter_selection(word_bank));
                }
            }
            RoomPhase::RoundReveal => {
                if too_few {
                    effects.extend(self.finish_game());
                }
            }
            RoomPhase::Lobby | RoomPhase::GameOver => {}
        }
        Ok(effects)
    }

    /// GameOver → Lobby with scores and readiness reset.
    pub fn restart(&mut self, user_id: &str, now: Instant) -> Result<Effects, GameError> {
        self.player(user_id)?;
        self.require_phase(RoomPhase::GameOver)?;

        self.phase = RoomPhase::Lobby;
        for player in self.players.values_mut() {
            player.score = 0;
            player.is_ready = false;
        }
        self.actor_id = None;
        self.actor_cursor = 0;
        self.actor_departed = false;
        self.round_number = 0;
        self.max_rounds = 0;
        self.selection = None;
        self.round = None;
        self.history.clear();
        self.used_words.clear();
        info!("Room {} restarted by {}", self.code, user_id);

        let mut effects = Effects::new();
        for player_id in &self.join_order {
            effects.to_player(
                player_id,
                ServerMessage::GameState(self.snapshot_for(player_id, now, false)),
            );
        }
        Ok(effects)
    }

    pub fn chat(&self, user_id: &str, message: &str) -> Result<Effects, GameError> {
        let player = self.player(user_id)?;
        let message = message.trim();
        let mut effects = Effects::new();
        if message.is_empty() {
            return Ok(effects);
        }
        effects.broadcast(ServerMessage::ChatMessage(ChatLine {
            user_id: user_id.to_string(),
            username: player.username.clone(),
            message: message.to_string(),
            sent_at: chrono::Utc::now().to_rfc3339(),
        }));
        Ok(effects)
    }
}

/// `Player_` plus the last four characters of the id.
fn default_username(user_id: &str) -> String {
    let tail: Vec<char> = user_id.chars().rev().take(4).collect();
    format!("Player_{}", tail.into_iter().rev().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategoryWordBank;
    use std::time::Duration;

    fn bank() -> CategoryWordBank {
        let mut bank = CategoryWordBank::new();
        bank.add_word_list(Difficulty::Easy, "animals", "cat\ndog\nbird\nfish\ncow\npig");
        bank
    }

    fn room_with(players: &[&str]) -> Room {
        let mut room = Room::new(RoomCode::parse("ABCD-1234").unwrap(), GameSettings::default());
        let now = Instant::now();
        for id in players {
            room.join(id, &id.to_uppercase(), now);
        }
        room
    }

    #[test]
    fn test_rotation_after_actor_leaves_mid_selection() {
        let bank = bank();
        let mut room = room_with(&["p1", "p2", "p3"]);
        for id in ["p1", "p2", "p3"] {
            room.set_ready(id, true).unwrap();
        }
        room.start("p1", Difficulty::Easy, Some(6), &bank).unwrap();
        assert_eq!(room.actor_id(), Some("p1"));

        let effects = room.leave("p1", &bank).unwrap();
        assert_eq!(room.phase(), RoomPhase::RoundSelecting);
        assert_eq!(room.actor_id(), Some("p2"));
        assert!(
            effects
                .messages_for("p2")
                .any(|m| matches!(m, ServerMessage::WordChoices(_)))
        );
        assert!(
            !effects
                .messages_for("p3")
                .any(|m| matches!(m, ServerMessage::WordChoices(_)))
        );
    }

    #[test]
    fn test_default_username() {
        let mut room = room_with(&[]);
        room.join("user_1234abcd", "  ", Instant::now());
        assert_eq!(room.player_infos()[0].username, "Player_abcd");
    }

    #[test]
    fn test_join_order_is_stable_and_rejoin_appends() {
        let bank = bank();
        let mut room = room_with(&["p1", "p2", "p3"]);
        room.leave("p1", &bank).unwrap();
        room.join("p1", "P1", Instant::now());
        assert_eq!(room.player_ids(), &["p2", "p3", "p1"]);

        // Reconnect of a present player keeps its slot.
        room.join("p2", "Bo", Instant::now());
        assert_eq!(room.player_ids(), &["p2", "p3", "p1"]);
    }

    #[test]
    fn test_client_time_up_before_deadline_is_ignored() {
        let bank = bank();
        let mut room = room_with(&["p1", "p2"]);
        room.set_ready("p1", true).unwrap();
        room.set_ready("p2", true).unwrap();
        room.start("p1", Difficulty::Easy, Some(2), &bank).unwrap();
        let now = Instant::now();
        let word = room.selection.as_ref().unwrap().choices[0].word.clone();
        room.select_word("p1", &word, now).unwrap();

        let early = room.client_time_up("p2", now + Duration::from_secs(30)).unwrap();
        assert!(early.is_empty());
        assert_eq!(room.phase(), RoomPhase::RoundActive);

        let late = room.client_time_up("p2", now + Duration::from_secs(60)).unwrap();
        assert_eq!(room.phase(), RoomPhase::RoundReveal);
        assert!(late.timers.contains(&TimerRequest::CancelRoundClock));
    }
}
