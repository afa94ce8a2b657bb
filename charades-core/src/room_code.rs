use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::GameError;

/// Alphabet used for generated codes. Excludes I, O, 0 and 1.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_GROUP_LEN: usize = 4;

fn room_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{4}$").expect("room code pattern"))
}

/// Shareable room identity in the form `XXXX-XXXX`, always uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalize and validate a client-supplied code. Case-insensitive.
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if room_code_pattern().is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(GameError::InvalidRoomCode {
                code: raw.to_string(),
            })
        }
    }

    /// Random code drawn from the unambiguous alphabet.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut group = || -> String {
            (0..ROOM_CODE_GROUP_LEN)
                .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
                .collect()
        };
        let first = group();
        let second = group();
        Self(format!("{}-{}", first, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}
