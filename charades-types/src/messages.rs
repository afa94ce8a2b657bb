use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::{
    Difficulty, FinalResults, GameSnapshot, LeaderboardEntry, NoticeKind, PlayerId, PlayerInfo,
    RoundSummary, WordChoice,
};

/// Named messages a client sends to the server.
///
/// On the wire every message is `{"event": "<kebab-name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[ts(export)]
pub enum ClientMessage {
    JoinGame(JoinGame),
    PlayerReady(PlayerReady),
    StartGame(StartGame),
    SelectWord(SelectWord),
    SubmitGuess(SubmitGuess),
    RequestHint(RoomRef),
    TimeUp(RoomRef),
    LeaveGame(LeaveGame),
    RestartGame(RoomRef),
    ChatMessage(SendChat),
    Offer(SignalMessage),
    Answer(SignalMessage),
    IceCandidate(SignalMessage),
    Heartbeat,
}

impl ClientMessage {
    /// Room code as sent by the client, before normalization.
    pub fn room_code(&self) -> Option<&str> {
        match self {
            ClientMessage::JoinGame(m) => Some(&m.room_code),
            ClientMessage::PlayerReady(m) => Some(&m.room_code),
            ClientMessage::StartGame(m) => Some(&m.room_code),
            ClientMessage::SelectWord(m) => Some(&m.room_code),
            ClientMessage::SubmitGuess(m) => Some(&m.room_code),
            ClientMessage::RequestHint(m)
            | ClientMessage::TimeUp(m)
            | ClientMessage::RestartGame(m) => Some(&m.room_code),
            ClientMessage::LeaveGame(m) => Some(&m.room_code),
            ClientMessage::ChatMessage(m) => Some(&m.room_code),
            ClientMessage::Offer(m) | ClientMessage::Answer(m) | ClientMessage::IceCandidate(m) => {
                Some(&m.room_code)
            }
            ClientMessage::Heartbeat => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JoinGame {
    pub room_code: String,
    pub user_id: PlayerId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerReady {
    pub room_code: String,
    pub user_id: PlayerId,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StartGame {
    pub room_code: String,
    #[serde(default, deserialize_with = "difficulty_by_name")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

/// Any name is accepted; case is ignored and unknown names mean easy.
fn difficulty_by_name<'de, D>(deserializer: D) -> Result<Difficulty, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.as_deref().map(Difficulty::from_name).unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SelectWord {
    pub room_code: String,
    pub user_id: PlayerId,
    pub word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitGuess {
    pub room_code: String,
    pub user_id: PlayerId,
    pub guess: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoomRef {
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeaveGame {
    pub room_code: String,
    pub user_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SendChat {
    pub room_code: String,
    pub user_id: PlayerId,
    pub message: String,
}

/// Offer, answer or ICE candidate addressed to one peer. The payload is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignalMessage {
    pub room_code: String,
    pub user_id: PlayerId,
    pub target_id: PlayerId,
    pub payload: serde_json::Value,
}

/// Named messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[ts(export)]
pub enum ServerMessage {
    GameState(GameSnapshot),
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    PlayerReadyUpdate(PlayerReadyUpdate),
    GameStarted(GameStarted),
    WordChoices(WordChoices),
    YourWord(YourWord),
    RoundStarted(RoundStarted),
    GuessMade(GuessMade),
    CorrectGuess(CorrectGuess),
    Hint(Hint),
    RoundEnded(RoundEnded),
    NextRound(NextRound),
    GameOver(GameOver),
    ChatMessage(ChatLine),
    Offer(RelayedSignal),
    Answer(RelayedSignal),
    IceCandidate(RelayedSignal),
    Error(Notice),
}

impl ServerMessage {
    pub fn notice(kind: NoticeKind, message: impl Into<String>) -> Self {
        ServerMessage::Error(Notice {
            kind,
            message: message.into(),
        })
    }

    /// Wire name of the message, as used in the `event` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::GameState(_) => "game-state",
            ServerMessage::PlayerJoined(_) => "player-joined",
            ServerMessage::PlayerLeft(_) => "player-left",
            ServerMessage::PlayerReadyUpdate(_) => "player-ready-update",
            ServerMessage::GameStarted(_) => "game-started",
            ServerMessage::WordChoices(_) => "word-choices",
            ServerMessage::YourWord(_) => "your-word",
            ServerMessage::RoundStarted(_) => "round-started",
            ServerMessage::GuessMade(_) => "guess-made",
            ServerMessage::CorrectGuess(_) => "correct-guess",
            ServerMessage::Hint(_) => "hint",
            ServerMessage::RoundEnded(_) => "round-ended",
            ServerMessage::NextRound(_) => "next-round",
            ServerMessage::GameOver(_) => "game-over",
            ServerMessage::ChatMessage(_) => "chat-message",
            ServerMessage::Offer(_) => "offer",
            ServerMessage::Answer(_) => "answer",
            ServerMessage::IceCandidate(_) => "ice-candidate",
            ServerMessage::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerJoined {
    pub user_id: PlayerId,
    pub username: String,
    pub players: Vec<PlayerInfo>,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Only used to pick the wording of the join notice.
    pub is_mid_game_join: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerLeft {
    pub user_id: PlayerId,
    pub players: Vec<PlayerInfo>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerReadyUpdate {
    pub user_id: PlayerId,
    pub is_ready: bool,
    pub all_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GameStarted {
    pub actor_id: PlayerId,
    pub round_number: u32,
    pub max_rounds: u32,
    pub difficulty: Difficulty,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WordChoices {
    pub round_number: u32,
    pub words: Vec<WordChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct YourWord {
    pub word: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoundStarted {
    pub round_number: u32,
    pub actor_id: PlayerId,
    pub category: String,
    pub word_length: u32,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GuessMade {
    pub user_id: PlayerId,
    pub username: String,
    pub guess: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CorrectGuess {
    pub user_id: PlayerId,
    pub username: String,
    pub points: u32,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Hint {
    /// Word with unrevealed letters replaced by `_`.
    pub hint: String,
    pub revealed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoundEnded {
    pub word: String,
    pub category: String,
    pub summary: RoundSummary,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub game_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NextRound {
    pub actor_id: PlayerId,
    pub round_number: u32,
    pub max_rounds: u32,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GameOver {
    pub results: FinalResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatLine {
    pub user_id: PlayerId,
    pub username: String,
    pub message: String,
    pub sent_at: String, // ISO 8601 string
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RelayedSignal {
    /// Sender of the signal.
    pub user_id: PlayerId,
    pub target_id: PlayerId,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_format() {
        let raw = json!({
            "event": "join-game",
            "data": { "roomCode": "abcd-1234", "userId": "user_a", "username": "Ann" }
        });

        let message: ClientMessage = serde_json::from_value(raw).unwrap();
        match message {
            ClientMessage::JoinGame(join) => {
                assert_eq!(join.room_code, "abcd-1234");
                assert_eq!(join.user_id, "user_a");
                assert_eq!(join.username, "Ann");
            }
            other => panic!("Expected JoinGame, got {:?}", other),
        }
    }

    #[test]
    fn test_start_game_defaults() {
        let raw = json!({ "event": "start-game", "data": { "roomCode": "ABCD-1234" } });
        let message: ClientMessage = serde_json::from_value(raw).unwrap();

        let ClientMessage::StartGame(start) = message else {
            panic!("Expected StartGame");
        };
        assert_eq!(start.difficulty, Difficulty::Easy);
        assert_eq!(start.max_rounds, None);
    }

    #[test]
    fn test_start_game_difficulty_is_lenient() {
        let parse = |difficulty: serde_json::Value| {
            let raw = json!({
                "event": "start-game",
                "data": { "roomCode": "ABCD-1234", "difficulty": difficulty }
            });
            match serde_json::from_value(raw).unwrap() {
                ClientMessage::StartGame(start) => start.difficulty,
                other => panic!("Expected StartGame, got {:?}", other),
            }
        };

        assert_eq!(parse(json!("hard")), Difficulty::Hard);
        assert_eq!(parse(json!("Hard")), Difficulty::Hard);
        assert_eq!(parse(json!("MEDIUM")), Difficulty::Medium);
        assert_eq!(parse(json!("EASY")), Difficulty::Easy);
        assert_eq!(parse(json!("expert")), Difficulty::Easy);
        assert_eq!(parse(json!(null)), Difficulty::Easy);
    }

    #[test]
    fn test_heartbeat_has_no_room() {
        let message: ClientMessage =
            serde_json::from_value(json!({ "event": "heartbeat" })).unwrap();
        assert!(message.room_code().is_none());
    }

    #[test]
    fn test_signal_payload_is_untouched() {
        let payload = json!({ "type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1" });
        let raw = json!({
            "event": "offer",
            "data": {
                "roomCode": "ABCD-1234",
                "userId": "user_a",
                "targetId": "user_b",
                "payload": payload.clone()
            }
        });

        let ClientMessage::Offer(signal) = serde_json::from_value(raw).unwrap() else {
            panic!("Expected Offer");
        };
        assert_eq!(signal.payload, payload);
    }

    #[test]
    fn test_server_message_event_names() {
        let message = ServerMessage::notice(NoticeKind::InvalidState, "Not your turn to act");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["event"], message.event_name());
        assert_eq!(value["data"]["kind"], "invalid-state");
        assert_eq!(value["data"]["message"], "Not your turn to act");
    }
}
