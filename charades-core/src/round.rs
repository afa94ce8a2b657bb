use charades_types::{PlayerId, RoundRecord, RoundSummary, WordChoice};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// The words offered to the actor while the room waits for a selection.
#[derive(Debug, Clone)]
pub struct WordSelection {
    pub round: u32,
    pub actor_id: PlayerId,
    pub choices: Vec<WordChoice>,
}

impl WordSelection {
    pub fn find(&self, word: &str) -> Option<&WordChoice> {
        let word = word.trim();
        self.choices.iter().find(|c| c.word.eq_ignore_ascii_case(word))
    }
}

/// One round between word selection and reveal.
#[derive(Debug, Clone)]
pub struct Round {
    pub number: u32,
    pub actor_id: PlayerId,
    pub actor_name: String,
    pub word: String,
    pub category: String,
    pub started_at: Instant,
    pub duration: Duration,
    correct_guessers: Vec<PlayerId>,
    actor_bonus_awarded: bool,
    total_guesses: u32,
    revealed: BTreeSet<usize>,
}

impl Round {
    pub fn new(
        number: u32,
        actor: (&str, &str),
        choice: &WordChoice,
        started_at: Instant,
        duration: Duration,
    ) -> Self {
        let (actor_id, actor_name) = actor;
        Self {
            number,
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            word: choice.word.clone(),
            category: choice.category.clone(),
            started_at,
            duration,
            correct_guessers: Vec::new(),
            actor_bonus_awarded: false,
            total_guesses: 0,
            revealed: BTreeSet::new(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.duration
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    pub fn word_length(&self) -> u32 {
        self.word.chars().count() as u32
    }

    pub fn has_guessed(&self, player_id: &str) -> bool {
        self.correct_guessers.iter().any(|p| p == player_id)
    }

    pub fn correct_guessers(&self) -> &[PlayerId] {
        &self.correct_guessers
    }

    pub fn record_guess(&mut self) {
        self.total_guesses += 1;
    }

    /// Returns false if the player already scored this round or is the actor.
    pub fn record_correct(&mut self, player_id: &str) -> bool {
        if player_id == self.actor_id || self.has_guessed(player_id) {
            return false;
        }
        self.correct_guessers.push(player_id.to_string());
        true
    }

    /// True exactly once per round.
    pub fn take_actor_bonus(&mut self) -> bool {
        !std::mem::replace(&mut self.actor_bonus_awarded, true)
    }

    pub fn hints_used(&self) -> u32 {
        self.revealed.len() as u32
    }

    /// Reveal the leftmost hidden letter. Characters that are not letters or
    /// digits are always visible, and the last hidden letter is never given away.
    pub fn reveal_next_letter(&mut self) -> Option<String> {
        let next = {
            let mut hidden = self
                .word
                .chars()
                .enumerate()
                .filter(|(i, c)| c.is_alphanumeric() && !self.revealed.contains(i))
                .map(|(i, _)| i);
            let first = hidden.next()?;
            hidden.next()?;
            first
        };
        self.revealed.insert(next);
        Some(self.masked_word())
    }

    pub fn masked_word(&self) -> String {
        self.word
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if !c.is_alphanumeric() || self.revealed.contains(&i) {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    pub fn record(&self) -> RoundRecord {
        RoundRecord {
            round: self.number,
            word: self.word.clone(),
            actor: self.actor_name.clone(),
            guessed_by: self.correct_guessers.len() as u32,
        }
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            round_number: self.number,
            word: self.word.clone(),
            category: self.category.clone(),
            actor_id: self.actor_id.clone(),
            correct_guessers: self.correct_guessers.clone(),
            total_guesses: self.total_guesses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charades_types::Difficulty;

    fn round_for(word: &str) -> Round {
        let choice = WordChoice {
            word: word.to_string(),
            category: "test".to_string(),
            difficulty: Difficulty::Easy,
        };
        Round::new(1, ("actor", "Ann"), &choice, Instant::now(), Duration::from_secs(60))
    }

    #[test]
    fn test_hints_reveal_left_to_right() {
        let mut round = round_for("cat");
        assert_eq!(round.masked_word(), "___");
        assert_eq!(round.reveal_next_letter().as_deref(), Some("c__"));
        assert_eq!(round.reveal_next_letter().as_deref(), Some("ca_"));
        assert_eq!(round.reveal_next_letter(), None);
        assert_eq!(round.hints_used(), 2);
    }

    #[test]
    fn test_hints_skip_spaces() {
        let mut round = round_for("ice cream");
        assert_eq!(round.masked_word(), "___ _____");
        round.reveal_next_letter();
        round.reveal_next_letter();
        round.reveal_next_letter();
        assert_eq!(round.reveal_next_letter().as_deref(), Some("ice c____"));
    }

    #[test]
    fn test_single_letter_word_has_no_hints() {
        let mut round = round_for("a");
        assert_eq!(round.reveal_next_letter(), None);
    }

    #[test]
    fn test_correct_guessers_are_unique_and_exclude_actor() {
        let mut round = round_for("cat");
        assert!(!round.record_correct("actor"));
        assert!(round.record_correct("p2"));
        assert!(!round.record_correct("p2"));
        assert_eq!(round.correct_guessers(), &["p2".to_string()]);
    }

    #[test]
    fn test_actor_bonus_taken_once() {
        let mut round = round_for("cat");
        assert!(round.take_actor_bonus());
        assert!(!round.take_actor_bonus());
    }

    #[test]
    fn test_clock() {
        let round = round_for("cat");
        let later = round.started_at + Duration::from_secs(45);
        assert_eq!(round.elapsed(later), Duration::from_secs(45));
        assert_eq!(round.remaining(later), Duration::from_secs(15));
        assert_eq!(round.remaining(round.started_at + Duration::from_secs(90)), Duration::ZERO);
    }
}
