#![allow(dead_code)]

use charades_core::{Effects, GameSettings, Room, RoomCode, WordBank};
use charades_types::{Difficulty, ServerMessage, WordChoice};
use std::collections::HashSet;
use std::time::Instant;

/// Word bank that always offers words in list order, so tests know what the
/// actor will see.
pub struct FixedWordBank {
    words: Vec<(&'static str, &'static str)>,
}

impl FixedWordBank {
    pub fn new(words: Vec<(&'static str, &'static str)>) -> Self {
        Self { words }
    }
}

impl Default for FixedWordBank {
    fn default() -> Self {
        Self::new(vec![
            ("cat", "animals"),
            ("dog", "animals"),
            ("pizza", "food"),
            ("swimming", "actions"),
            ("ice cream", "food"),
            ("guitar", "objects"),
            ("elephant", "animals"),
            ("dancing", "actions"),
        ])
    }
}

impl WordBank for FixedWordBank {
    fn pick(
        &self,
        difficulty: Difficulty,
        count: usize,
        excluding: &HashSet<String>,
    ) -> Vec<WordChoice> {
        self.words
            .iter()
            .filter(|(word, _)| !excluding.contains(*word))
            .take(count)
            .map(|(word, category)| WordChoice {
                word: word.to_string(),
                category: category.to_string(),
                difficulty,
            })
            .collect()
    }
}

pub fn test_code() -> RoomCode {
    RoomCode::parse("TEST-0001").expect("valid test code")
}

/// Creates a lobby with the given players joined in order. Usernames are the
/// capitalized ids.
pub fn create_room_with_players(players: &[&str]) -> Room {
    create_room_with_settings(players, GameSettings::default())
}

pub fn create_room_with_settings(players: &[&str], settings: GameSettings) -> Room {
    let mut room = Room::new(test_code(), settings);
    let now = Instant::now();
    for id in players {
        room.join(id, &capitalize(id), now);
    }
    room
}

pub fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn ready_all(room: &mut Room) {
    let ids = room.player_ids().to_vec();
    for id in ids {
        room.set_ready(&id, true).expect("player can ready up");
    }
}

/// Readies everyone and starts the game. Returns the start effects.
pub fn start_game(room: &mut Room, bank: &dyn WordBank, max_rounds: Option<u32>) -> Effects {
    ready_all(room);
    let first = room.player_ids()[0].clone();
    room.start(&first, Difficulty::Easy, max_rounds, bank)
        .expect("game starts")
}

/// Words offered to `player_id` in these effects, if any.
pub fn offered_words(effects: &Effects, player_id: &str) -> Vec<String> {
    effects
        .messages_for(player_id)
        .find_map(|message| match message {
            ServerMessage::WordChoices(choices) => {
                Some(choices.words.iter().map(|w| w.word.clone()).collect())
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Starts the game and has the first actor pick the first offered word.
pub fn start_round(
    room: &mut Room,
    bank: &dyn WordBank,
    max_rounds: Option<u32>,
    now: Instant,
) -> String {
    let effects = start_game(room, bank, max_rounds);
    let actor = room.actor_id().expect("actor assigned").to_string();
    let word = offered_words(&effects, &actor)
        .into_iter()
        .next()
        .expect("actor was offered words");
    room.select_word(&actor, &word, now).expect("actor selects word");
    word
}

pub fn count_events(effects: &Effects, player_id: &str, event: &str) -> usize {
    effects
        .messages_for(player_id)
        .filter(|m| m.event_name() == event)
        .count()
}

pub fn has_event(effects: &Effects, player_id: &str, event: &str) -> bool {
    count_events(effects, player_id, event) > 0
}
