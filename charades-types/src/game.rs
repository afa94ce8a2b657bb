use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::{LeaderboardEntry, PlayerId, PlayerInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoomPhase {
    Lobby,          // Waiting for players to ready up
    RoundSelecting, // Actor is choosing a word
    RoundActive,    // Clock running, guesses accepted
    RoundReveal,    // Word revealed, next round pending
    GameOver,       // Final leaderboard shown until restart
}

impl RoomPhase {
    pub fn is_in_game(self) -> bool {
        !matches!(self, RoomPhase::Lobby)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomPhase::Lobby => "lobby",
            RoomPhase::RoundSelecting => "word selection",
            RoomPhase::RoundActive => "active round",
            RoomPhase::RoundReveal => "round reveal",
            RoomPhase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Unknown names fall back to `Easy`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the words offered to the actor. Only ever sent to the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WordChoice {
    pub word: String,
    pub category: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoundSummary {
    pub round_number: u32,
    pub word: String,
    pub category: String,
    pub actor_id: PlayerId,
    pub correct_guessers: Vec<PlayerId>,
    pub total_guesses: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoundRecord {
    pub round: u32,
    pub word: String,
    pub actor: String,
    pub guessed_by: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FinalResults {
    pub winner: Option<LeaderboardEntry>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub total_rounds: u32,
    pub round_history: Vec<RoundRecord>,
}

/// Full room state used for the initial join and for mid-game joins.
///
/// While a round runs, `word` is only filled in for the actor. Everyone else
/// gets the category, the word length and the masked hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GameSnapshot {
    pub room_code: String,
    pub phase: RoomPhase,
    pub players: Vec<PlayerInfo>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub actor_id: Option<PlayerId>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub word_length: Option<u32>,
    pub word: Option<String>,
    pub hint: Option<String>,
    pub remaining_seconds: Option<u32>,
    pub is_mid_game_join: bool,
}
