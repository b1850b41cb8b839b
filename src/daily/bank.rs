//! Curated fallback content.
//!
//! The bank is a static table of numbered sets, each holding one template per
//! difficulty in `Easy, Medium, Hard` order. It ships embedded in the binary
//! and can be replaced at startup with a JSON file of the same shape.

use serde::Deserialize;

use crate::models::challenge::{ChallengeTemplate, Difficulty, OPTION_COUNT};

const EMBEDDED_BANK: &str = include_str!("../../data/challenge_bank.json");

/// Three templates sharing a theme.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeSet {
    pub theme: String,
    pub challenges: Vec<ChallengeTemplate>,
}

impl ChallengeSet {
    pub fn template(&self, difficulty: Difficulty) -> &ChallengeTemplate {
        &self.challenges[difficulty.slot()]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeBank {
    sets: Vec<ChallengeSet>,
}

impl ChallengeBank {
    /// The bank compiled into the binary.
    pub fn embedded() -> Result<Self, String> {
        Self::from_json(EMBEDDED_BANK)
    }

    /// Reads `path` when given, otherwise falls back to the embedded bank.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read challenge bank '{}': {}", path, e))?;
                let bank = Self::from_json(&raw)?;
                tracing::info!(%path, sets = bank.len(), "Loaded challenge bank from file");
                Ok(bank)
            }
            None => Self::embedded(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let bank: ChallengeBank =
            serde_json::from_str(raw).map_err(|e| format!("invalid challenge bank JSON: {}", e))?;
        bank.validate()?;
        Ok(bank)
    }

    pub fn from_sets(sets: Vec<ChallengeSet>) -> Result<Self, String> {
        let bank = ChallengeBank { sets };
        bank.validate()?;
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[ChallengeSet] {
        &self.sets
    }

    pub fn get(&self, index: usize) -> Option<&ChallengeSet> {
        self.sets.get(index)
    }

    fn validate(&self) -> Result<(), String> {
        if self.sets.is_empty() {
            return Err("challenge bank has no sets".to_string());
        }
        for (i, set) in self.sets.iter().enumerate() {
            if set.challenges.len() != Difficulty::ALL.len() {
                return Err(format!(
                    "set {} ('{}') has {} challenges, expected {}",
                    i,
                    set.theme,
                    set.challenges.len(),
                    Difficulty::ALL.len()
                ));
            }
            for t in &set.challenges {
                if t.options.len() != OPTION_COUNT {
                    return Err(format!(
                        "set {} challenge '{}' has {} options",
                        i,
                        t.title,
                        t.options.len()
                    ));
                }
                if t.correct_answer >= OPTION_COUNT {
                    return Err(format!(
                        "set {} challenge '{}' has correct_answer {}",
                        i, t.title, t.correct_answer
                    ));
                }
                if t.title.trim().is_empty() || t.question.trim().is_empty() {
                    return Err(format!("set {} has a challenge without title or question", i));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn embedded_bank_is_valid() {
        let bank = ChallengeBank::embedded().unwrap();
        assert_eq!(bank.len(), 10);
        assert_eq!(bank.get(0).unwrap().theme, "Ancient civilizations");
    }

    #[test]
    fn embedded_titles_are_unique() {
        let bank = ChallengeBank::embedded().unwrap();
        let titles: Vec<String> = bank
            .sets()
            .iter()
            .flat_map(|s| s.challenges.iter().map(|c| c.title.to_lowercase()))
            .collect();
        let unique: HashSet<&String> = titles.iter().collect();
        assert_eq!(unique.len(), titles.len());
    }

    #[test]
    fn rejects_set_with_wrong_size() {
        let raw = r#"{"sets": [{"theme": "short", "challenges": []}]}"#;
        let err = ChallengeBank::from_json(raw).unwrap_err();
        assert!(err.contains("expected 3"));
    }

    #[test]
    fn rejects_out_of_range_answer() {
        let template = r#"{"title": "t", "description": "d", "question": "q",
            "options": ["a", "b", "c", "d"], "correct_answer": 4, "explanation": "e", "hint": "h"}"#;
        let raw = format!(
            r#"{{"sets": [{{"theme": "x", "challenges": [{0}, {0}, {0}]}}]}}"#,
            template
        );
        assert!(ChallengeBank::from_json(&raw).is_err());
    }

    #[test]
    fn rejects_empty_bank() {
        assert!(ChallengeBank::from_json(r#"{"sets": []}"#).is_err());
    }
}
