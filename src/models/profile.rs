// src/models/profile.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::achievement::UnlockedAchievement;
use crate::models::challenge::Difficulty;

/// Represents the 'profiles' table. The id is the identity provider's user id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub total_points: i32,
    pub current_streak: i32,
    pub longest_streak: i32,

    /// Last day (UTC) the user answered a challenge correctly.
    pub last_challenge_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents the 'user_challenge_attempts' table.
/// One per user and day slot; `challenge_id` is cleared if the day is regenerated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: Option<Uuid>,
    pub challenge_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    pub selected_answer: i32,
    pub is_correct: bool,
    pub points_earned: i32,
    pub completed_at: DateTime<Utc>,
}

/// DTO for answering a challenge.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(range(min = 0, max = 3, message = "selected_answer must be between 0 and 3."))]
    pub selected_answer: i32,
}

/// Result of an answer submission.
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub is_correct: bool,
    pub points_earned: i32,
    pub correct_answer: i32,
    pub explanation: String,
    pub unlocked_achievements: Vec<UnlockedAchievement>,

    /// `None` until the user has answered something correctly.
    pub profile: Option<UserProfile>,
}

/// Current user's profile and badges.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub profile: Option<UserProfile>,
    pub achievements: Vec<UnlockedAchievement>,
}
