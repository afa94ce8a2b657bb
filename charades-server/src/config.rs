use charades_core::GameSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory of `<difficulty>/<category>.txt` word lists. Built-in words
    /// are used when unset.
    pub words_directory: Option<String>,
    pub round_seconds: u64,
    pub reveal_delay_seconds: u64,
    pub rounds_per_player: u32,
    pub word_choices: usize,
    pub connection_timeout_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub rate_limit_burst: u32,
    pub rate_limit_per_second: u32,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080),
            words_directory: env::var("WORDS_DIRECTORY").ok().filter(|dir| !dir.is_empty()),
            round_seconds: parse_var("ROUND_SECONDS", 60),
            reveal_delay_seconds: parse_var("REVEAL_DELAY_SECONDS", 5),
            rounds_per_player: parse_var("ROUNDS_PER_PLAYER", 2),
            word_choices: parse_var("WORD_CHOICES", 3),
            connection_timeout_seconds: parse_var("CONNECTION_TIMEOUT_SECONDS", 120),
            cleanup_interval_seconds: parse_var("CLEANUP_INTERVAL_SECONDS", 30),
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", 120),
            rate_limit_per_second: parse_var("RATE_LIMIT_PER_SECOND", 30),
        }
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            round_duration: Duration::from_secs(self.round_seconds),
            reveal_delay: Duration::from_secs(self.reveal_delay_seconds),
            rounds_per_player: self.rounds_per_player,
            word_choices: self.word_choices,
            ..GameSettings::default()
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Invalid {name}: {raw}")),
        Err(_) => default,
    }
}
