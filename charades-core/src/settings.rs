use std::time::Duration;

use crate::ScoringRules;

pub const MIN_PLAYERS: usize = 2;

/// Per-process game tuning, shared by every room.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub round_duration: Duration,
    pub reveal_delay: Duration,
    pub rounds_per_player: u32,
    pub word_choices: usize,
    /// Grace period applied to client-reported `time-up` before the server deadline.
    pub time_up_tolerance: Duration,
    pub scoring: ScoringRules,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(60),
            reveal_delay: Duration::from_secs(5),
            rounds_per_player: 2,
            word_choices: 3,
            time_up_tolerance: Duration::from_millis(500),
            scoring: ScoringRules::default(),
        }
    }
}
