use charades_types::LeaderboardEntry;
use std::time::Duration;

/// Point values for a round.
///
/// A correct guess is worth `correct_guess + speed_bonus(elapsed)`, where the
/// speed bonus shrinks as the round clock runs down and never goes negative.
/// The actor earns `actor_bonus` once per round, the first time anyone lands
/// the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    pub correct_guess: u32,
    pub actor_bonus: u32,
    pub speed_bonus_per_second: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            correct_guess: 100,
            actor_bonus: 50,
            speed_bonus_per_second: 1,
        }
    }
}

impl ScoringRules {
    /// Whole seconds left on the clock times the per-second bonus.
    pub fn speed_bonus(&self, elapsed: Duration, round_duration: Duration) -> u32 {
        let remaining = round_duration.saturating_sub(elapsed).as_secs();
        u32::try_from(remaining)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.speed_bonus_per_second)
    }

    pub fn guess_points(&self, elapsed: Duration, round_duration: Duration) -> u32 {
        self.correct_guess
            .saturating_add(self.speed_bonus(elapsed, round_duration))
    }
}

/// A player's standing, supplied in join order.
#[derive(Debug, Clone, Copy)]
pub struct Standing<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub score: u32,
}

/// Sort by score descending. Ties keep join order because the sort is stable.
/// Ranks run 1..=N.
pub fn rank_standings<'a>(
    standings: impl IntoIterator<Item = Standing<'a>>,
) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<Standing<'a>> = standings.into_iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    sorted
        .into_iter()
        .enumerate()
        .map(|(index, standing)| LeaderboardEntry {
            rank: index as u32 + 1,
            user_id: standing.user_id.to_string(),
            username: standing.username.to_string(),
            score: standing.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_bonus_is_non_increasing() {
        let rules = ScoringRules::default();
        let duration = Duration::from_secs(60);

        let mut previous = u32::MAX;
        for millis in (0..=70_000).step_by(250) {
            let bonus = rules.speed_bonus(Duration::from_millis(millis), duration);
            assert!(bonus <= previous, "bonus rose at {}ms", millis);
            previous = bonus;
        }
    }

    #[test]
    fn test_speed_bonus_bounds() {
        let rules = ScoringRules::default();
        let duration = Duration::from_secs(60);

        assert_eq!(rules.speed_bonus(Duration::ZERO, duration), 60);
        assert_eq!(rules.speed_bonus(Duration::from_millis(59_500), duration), 0);
        assert_eq!(rules.speed_bonus(Duration::from_secs(600), duration), 0);
    }

    #[test]
    fn test_guess_points() {
        let rules = ScoringRules {
            correct_guess: 100,
            actor_bonus: 50,
            speed_bonus_per_second: 2,
        };
        let duration = Duration::from_secs(60);

        assert_eq!(rules.guess_points(Duration::from_secs(10), duration), 200);
        assert_eq!(rules.guess_points(Duration::from_secs(90), duration), 100);
    }

    #[test]
    fn test_rank_standings_ties_keep_join_order() {
        let standings = [
            Standing { user_id: "p1", username: "Ann", score: 150 },
            Standing { user_id: "p2", username: "Bo", score: 200 },
            Standing { user_id: "p3", username: "Cy", score: 150 },
            Standing { user_id: "p4", username: "Di", score: 0 },
        ];

        let board = rank_standings(standings);
        let order: Vec<_> = board.iter().map(|e| (e.rank, e.user_id.as_str())).collect();
        assert_eq!(order, vec![(1, "p2"), (2, "p1"), (3, "p3"), (4, "p4")]);
    }

    #[test]
    fn test_rank_standings_empty() {
        assert!(rank_standings(Vec::<Standing>::new()).is_empty());
    }
}
