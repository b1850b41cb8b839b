// src/handlers/answer.rs

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        achievement::{Achievement, ProgressStats, UnlockedAchievement, newly_unlocked},
        profile::{AnswerResponse, SubmitAnswerRequest, UserProfile},
    },
    utils::jwt::Claims,
};

/// Helper struct for fetching the answer key of a challenge.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    correct_answer: i32,
    explanation: String,
    points: i32,
    date_assigned: NaiveDate,
    difficulty: String,
}

/// Streak after a correct answer on `today`.
///
/// Answering again on the same day keeps the streak, answering the day after
/// extends it, and any gap starts over at 1.
pub fn next_streak(last: Option<NaiveDate>, current: i32, today: NaiveDate) -> i32 {
    match last {
        Some(day) if day == today => current.max(1),
        Some(day) if day.succ_opt() == Some(today) => current + 1,
        _ => 1,
    }
}

/// Submits an answer to one challenge.
///
/// * One attempt per user and day slot (409 on retry, also after the day was
///   regenerated).
/// * A correct answer adds the challenge's points, updates the streak and
///   unlocks any achievement whose requirement is now met.
/// * Everything is written in one transaction.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(challenge_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let key = sqlx::query_as::<_, AnswerKey>(
        "SELECT correct_answer, explanation, points, date_assigned, difficulty FROM challenges WHERE id = $1",
    )
    .bind(challenge_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Challenge not found".to_string()))?;

    let is_correct = req.selected_answer == key.correct_answer;
    let points_earned = if is_correct { key.points } else { 0 };
    let today = Utc::now().date_naive();

    let mut tx = pool.begin().await?;

    let attempt_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO user_challenge_attempts
            (id, user_id, challenge_id, challenge_date, difficulty,
             selected_answer, is_correct, points_earned)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, challenge_date, difficulty) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(challenge_id)
    .bind(key.date_assigned)
    .bind(&key.difficulty)
    .bind(req.selected_answer)
    .bind(is_correct)
    .bind(points_earned)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if attempt_id.is_none() {
        return Err(AppError::Conflict("Challenge already answered".to_string()));
    }

    let mut unlocked_achievements = Vec::new();

    let profile = if is_correct {
        let current = sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let (total_points, streak, longest) = match &current {
            Some(p) => {
                let streak = next_streak(p.last_challenge_date, p.current_streak, today);
                (p.total_points + points_earned, streak, p.longest_streak.max(streak))
            }
            None => (points_earned, 1, 1),
        };

        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO profiles (id, username, total_points, current_streak, longest_streak, last_challenge_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                total_points = EXCLUDED.total_points,
                current_streak = EXCLUDED.current_streak,
                longest_streak = EXCLUDED.longest_streak,
                last_challenge_date = EXCLUDED.last_challenge_date,
                username = COALESCE(profiles.username, EXCLUDED.username),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(claims.default_username())
        .bind(total_points)
        .bind(streak)
        .bind(longest)
        .bind(today)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert profile: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        let challenges_completed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_challenge_attempts WHERE user_id = $1 AND is_correct",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let achievements = sqlx::query_as::<_, Achievement>(
            "SELECT * FROM achievements ORDER BY requirement_value",
        )
        .fetch_all(&mut *tx)
        .await?;

        let held: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT achievement_id FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let stats = ProgressStats {
            total_points: profile.total_points,
            current_streak: profile.current_streak,
            challenges_completed,
        };

        for achievement in newly_unlocked(&achievements, &held, &stats) {
            let unlocked_at = sqlx::query_scalar(
                r#"
                INSERT INTO user_achievements (id, user_id, achievement_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, achievement_id) DO NOTHING
                RETURNING unlocked_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(achievement.id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(unlocked_at) = unlocked_at {
                tracing::info!(%user_id, achievement = %achievement.title, "Achievement unlocked");
                unlocked_achievements.push(UnlockedAchievement {
                    id: achievement.id,
                    title: achievement.title.clone(),
                    description: achievement.description.clone(),
                    icon: achievement.icon.clone(),
                    unlocked_at,
                });
            }
        }

        Some(profile)
    } else {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
    };

    tx.commit().await?;

    Ok(Json(AnswerResponse {
        is_correct,
        points_earned,
        correct_answer: key.correct_answer,
        explanation: key.explanation,
        unlocked_achievements,
        profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, n).unwrap()
    }

    #[test]
    fn first_correct_answer_starts_a_streak() {
        assert_eq!(next_streak(None, 0, day(10)), 1);
    }

    #[test]
    fn consecutive_day_extends_streak() {
        assert_eq!(next_streak(Some(day(9)), 4, day(10)), 5);
    }

    #[test]
    fn same_day_keeps_streak() {
        assert_eq!(next_streak(Some(day(10)), 4, day(10)), 4);
        assert_eq!(next_streak(Some(day(10)), 0, day(10)), 1);
    }

    #[test]
    fn gap_resets_streak() {
        assert_eq!(next_streak(Some(day(7)), 9, day(10)), 1);
    }

    #[test]
    fn month_boundary_counts_as_consecutive() {
        let last = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        assert_eq!(next_streak(Some(last), 2, day(1)), 3);
    }
}
