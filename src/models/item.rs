use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// Score awarded for a correct answer at this difficulty.
    pub fn points(self) -> i32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
            Difficulty::Expert => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// One accepted quiz item. Immutable once it clears the duplicate guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    pub text: String,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub reference: String,
    pub difficulty: Difficulty,
    pub points: i32,
    pub generated: bool,
    pub unique_id: String,
}

impl GeneratedItem {
    /// `options` holds the correct answer exactly once, at least two entries, no repeats.
    pub fn has_valid_options(&self) -> bool {
        let hits = self
            .options
            .iter()
            .filter(|o| **o == self.correct_answer)
            .count();
        let mut seen = std::collections::HashSet::new();
        let distinct = self.options.iter().all(|o| seen.insert(o.as_str()));
        hits == 1 && self.options.len() >= 2 && distinct
    }
}
