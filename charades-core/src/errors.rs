use charades_types::RoomPhase;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Invalid room code: {code}")]
    InvalidRoomCode { code: String },
    #[error("Cannot do that during {actual}")]
    WrongPhase { actual: RoomPhase },
    #[error("Not your turn to act")]
    NotActor,
    #[error("The actor cannot guess")]
    ActorCannotGuess,
    #[error("The actor cannot request hints")]
    ActorCannotRequestHint,
    #[error("Need at least {needed} players to start, have {present}")]
    NotEnoughPlayers { needed: usize, present: usize },
    #[error("Not all players are ready")]
    PlayersNotReady,
    #[error("Room {code} does not exist")]
    RoomNotFound { code: String },
    #[error("Player {player_id} is not in this room")]
    PlayerNotInRoom { player_id: String },
    #[error("'{word}' is not one of the offered words")]
    WordNotOffered { word: String },
    #[error("No more hints for this word")]
    NoHintsLeft,
    #[error("Word bank has no words left for {difficulty}")]
    WordBankExhausted { difficulty: String },
}

impl GameError {
    /// References to players or rooms that are already gone. These are expected
    /// races between clients and are dropped without telling anyone.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            GameError::PlayerNotInRoom { .. } | GameError::RoomNotFound { .. }
        )
    }
}
