use anyhow::{Context, Result};
use charades_types::{Difficulty, WordChoice};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Source of the words offered to the actor.
pub trait WordBank: Send + Sync {
    /// Up to `count` distinct words of the given difficulty, skipping anything in
    /// `excluding` (compared lowercase).
    fn pick(
        &self,
        difficulty: Difficulty,
        count: usize,
        excluding: &HashSet<String>,
    ) -> Vec<WordChoice>;
}

/// Difficulty → category → words.
#[derive(Debug, Clone, Default)]
pub struct CategoryWordBank {
    categories: HashMap<Difficulty, BTreeMap<String, Vec<String>>>,
}

impl CategoryWordBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<dir>/<difficulty>/<category>.txt`, one word or phrase per line.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut bank = Self::new();

        for difficulty in Difficulty::ALL {
            let difficulty_dir = dir.join(difficulty.as_str());
            if !difficulty_dir.is_dir() {
                debug!("No word directory for {} at {}", difficulty, difficulty_dir.display());
                continue;
            }

            let entries = std::fs::read_dir(&difficulty_dir)
                .with_context(|| format!("reading {}", difficulty_dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let Some(category) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                bank.add_word_list(difficulty, category, &contents);
            }
        }

        if bank.is_empty() {
            anyhow::bail!("no word lists found under {}", dir.display());
        }
        info!(
            "Loaded word bank from {}: easy={} medium={} hard={}",
            dir.display(),
            bank.word_count(Difficulty::Easy),
            bank.word_count(Difficulty::Medium),
            bank.word_count(Difficulty::Hard)
        );
        Ok(bank)
    }

    /// Small default bank so a server runs without any word files.
    pub fn builtin() -> Self {
        let mut bank = Self::new();
        let easy = [
            (
                "animals",
                "cat dog bird fish bear lion tiger elephant monkey rabbit duck cow pig horse snake frog bee spider",
            ),
            (
                "actions",
                "eat drink sleep run walk jump dance swim fly read write sing cry laugh wave clap push pull kick",
            ),
            (
                "objects",
                "ball book phone car house tree flower sun moon star water fire door window chair table bed cup key",
            ),
            (
                "food",
                "apple banana orange pizza burger cake bread egg milk coffee tea rice chicken cheese soup salad",
            ),
        ];
        let medium = [
            (
                "emotions",
                "happy sad angry scared surprised tired excited nervous confused proud shy bored",
            ),
            (
                "activities",
                "cooking shopping driving working studying painting camping fishing hiking gardening cleaning",
            ),
            (
                "nature",
                "rain snow wind storm rainbow mountain river ocean forest desert island volcano",
            ),
            (
                "sports",
                "football basketball tennis swimming boxing golf baseball hockey skiing surfing",
            ),
        ];
        let hard = [
            (
                "concepts",
                "time love peace freedom dream hope future past memory idea secret promise",
            ),
            (
                "professions",
                "doctor teacher police firefighter chef artist musician scientist pilot farmer",
            ),
        ];

        for (difficulty, lists) in [
            (Difficulty::Easy, &easy[..]),
            (Difficulty::Medium, &medium[..]),
            (Difficulty::Hard, &hard[..]),
        ] {
            for (category, words) in lists {
                bank.add_category(difficulty, category, words.split_whitespace());
            }
        }
        bank.add_category(Difficulty::Easy, "food", ["ice cream"]);
        bank.add_category(
            Difficulty::Hard,
            "phrases",
            [
                "good morning",
                "thank you",
                "happy birthday",
                "good night",
                "see you later",
                "excuse me",
            ],
        );
        bank
    }

    pub fn add_category<I, S>(&mut self, difficulty: Difficulty, category: &str, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = self
            .categories
            .entry(difficulty)
            .or_default()
            .entry(category.to_string())
            .or_default();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && !list.contains(&word) {
                list.push(word);
            }
        }
    }

    pub fn add_word_list(&mut self, difficulty: Difficulty, category: &str, word_list: &str) {
        let words = word_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        self.add_category(difficulty, category, words);
    }

    pub fn word_count(&self, difficulty: Difficulty) -> usize {
        self.categories
            .get(&difficulty)
            .map(|categories| categories.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        Difficulty::ALL.iter().all(|d| self.word_count(*d) == 0)
    }
}

impl WordBank for CategoryWordBank {
    fn pick(
        &self,
        difficulty: Difficulty,
        count: usize,
        excluding: &HashSet<String>,
    ) -> Vec<WordChoice> {
        let Some(categories) = self.categories.get(&difficulty) else {
            return Vec::new();
        };

        let mut candidates: Vec<(&str, &str)> = categories
            .iter()
            .flat_map(|(category, words)| {
                words.iter().map(move |w| (category.as_str(), w.as_str()))
            })
            .filter(|(_, word)| !excluding.contains(*word))
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|(_, word)| seen.insert(*word))
            .take(count)
            .map(|(category, word)| WordChoice {
                word: word.to_string(),
                category: category.to_string(),
                difficulty,
            })
            .collect()
    }
}

/// Case-insensitive comparison after trimming. A guess that only differs by
/// spaces also counts ("icecream" for "ice cream").
pub fn guess_matches(guess: &str, word: &str) -> bool {
    let guess = guess.trim().to_lowercase();
    let word = word.trim().to_lowercase();
    if guess.is_empty() {
        return false;
    }
    if guess == word {
        return true;
    }
    let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    squash(&guess) == squash(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_bank() -> CategoryWordBank {
        let mut bank = CategoryWordBank::new();
        bank.add_word_list(Difficulty::Easy, "animals", "cat\ndog\n# comment\n\nbird");
        bank.add_word_list(Difficulty::Easy, "food", "fish\ncake");
        bank.add_word_list(Difficulty::Easy, "pets", "fish\nCat");
        bank
    }

    #[test]
    fn test_word_list_parsing() {
        let bank = small_bank();
        assert_eq!(bank.word_count(Difficulty::Easy), 7);
        assert_eq!(bank.word_count(Difficulty::Hard), 0);
    }

    #[test]
    fn test_pick_returns_distinct_words() {
        let bank = small_bank();
        for _ in 0..50 {
            let choices = bank.pick(Difficulty::Easy, 5, &HashSet::new());
            let unique: HashSet<_> = choices.iter().map(|c| c.word.clone()).collect();
            assert_eq!(unique.len(), choices.len());
            assert_eq!(choices.len(), 5);
            assert!(choices.iter().all(|c| c.difficulty == Difficulty::Easy));
        }
    }

    #[test]
    fn test_pick_honours_exclusions() {
        let bank = small_bank();
        let excluding: HashSet<String> = ["cat", "dog", "bird", "fish"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let choices = bank.pick(Difficulty::Easy, 3, &excluding);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].word, "cake");
        assert_eq!(choices[0].category, "food");
    }

    #[test]
    fn test_pick_unknown_difficulty_is_empty() {
        assert!(small_bank().pick(Difficulty::Hard, 3, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_builtin_has_every_difficulty() {
        let bank = CategoryWordBank::builtin();
        for difficulty in Difficulty::ALL {
            assert!(bank.word_count(difficulty) >= 3, "{} too small", difficulty);
        }
    }

    #[test]
    fn test_from_directory() {
        let dir = std::env::temp_dir().join(format!("charades-words-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("medium")).unwrap();
        std::fs::write(dir.join("medium").join("nature.txt"), "rain\nsnow\n").unwrap();
        std::fs::write(dir.join("medium").join("notes.md"), "ignored").unwrap();

        let bank = CategoryWordBank::from_directory(&dir).unwrap();
        assert_eq!(bank.word_count(Difficulty::Medium), 2);
        assert_eq!(bank.word_count(Difficulty::Easy), 0);

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(CategoryWordBank::from_directory(&dir).is_err());
    }

    #[test]
    fn test_guess_matches() {
        assert!(guess_matches("CAT", "cat"));
        assert!(guess_matches("  cat \n", "cat"));
        assert!(guess_matches("icecream", "ice cream"));
        assert!(guess_matches("Ice  Cream", "ice cream"));
        assert!(!guess_matches("dog", "cat"));
        assert!(!guess_matches("cats", "cat"));
        assert!(!guess_matches("   ", "cat"));
    }
}
