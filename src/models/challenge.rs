// src/models/challenge.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;

/// Every challenge is a four-option multiple choice question.
pub const OPTION_COUNT: usize = 4;

/// Value stored in `challenges.challenge_type`.
pub const CHALLENGE_TYPE: &str = "multiple_choice";

/// Difficulty slot of a daily challenge. A day holds exactly one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Slot order used for storage, bank templates and responses.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn points(self) -> i32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
        }
    }

    /// Position of this difficulty inside a bank set.
    pub fn slot(self) -> usize {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Represents the 'challenges' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub question: String,

    /// Exactly four answer options, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Index (0-3) into `options`.
    pub correct_answer: i32,

    pub explanation: String,
    pub hint: String,

    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,

    pub points: i32,
    pub challenge_type: String,

    /// Calendar day (UTC) the challenge is served on.
    pub date_assigned: NaiveDate,

    pub created_at: Option<DateTime<Utc>>,
}

/// Curated or generated challenge content before it is bound to a day.
///
/// This is both the shape of a bank template and the JSON object the
/// external generator must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTemplate {
    pub title: String,
    pub description: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
    pub hint: String,
}

/// Where the content of a resolved slot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeSource {
    Generated,
    Fallback,
}

/// A fully resolved challenge, ready to be inserted for its day.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
    pub hint: String,
    pub difficulty: Difficulty,
    pub points: i32,
    pub date_assigned: NaiveDate,
    pub source: ChallengeSource,
}

/// Read projection over past assignments, used for duplicate detection.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRecord {
    pub title: String,
    pub question: String,
    pub date_assigned: NaiveDate,
}

impl From<&Challenge> for HistoryRecord {
    fn from(c: &Challenge) -> Self {
        HistoryRecord {
            title: c.title.clone(),
            question: c.question.clone(),
            date_assigned: c.date_assigned,
        }
    }
}

/// DTO for sending a challenge to clients (excludes answer and explanation).
#[derive(Debug, Serialize)]
pub struct PublicChallenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub question: String,
    pub options: Vec<String>,
    pub hint: String,
    pub difficulty: Difficulty,
    pub points: i32,
    pub challenge_type: String,
    pub date_assigned: NaiveDate,
}

impl From<Challenge> for PublicChallenge {
    fn from(c: Challenge) -> Self {
        PublicChallenge {
            id: c.id,
            title: c.title,
            description: c.description,
            question: c.question,
            options: c.options.0,
            hint: c.hint,
            difficulty: c.difficulty,
            points: c.points,
            challenge_type: c.challenge_type,
            date_assigned: c.date_assigned,
        }
    }
}

/// Body of `POST /api/challenges/generate`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Day to generate for; today (UTC) when absent.
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Regenerate even if the day already holds a unique set.
    #[serde(default, alias = "forceRegenerate")]
    pub force: bool,
}

/// Result payload of a generation run.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    pub challenges: usize,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_used: Option<usize>,
}

/// `?date=YYYY-MM-DD` query parameter.
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}
