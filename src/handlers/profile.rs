use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        achievement::{Achievement, UnlockedAchievement},
        challenge::DateQuery,
        profile::{MeResponse, UserAttempt, UserProfile},
    },
    utils::jwt::Claims,
};

/// Get current user's profile and unlocked achievements.
/// The profile is `null` until the first correct answer creates it.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

    let achievements = sqlx::query_as::<_, UnlockedAchievement>(
        r#"
        SELECT a.id, a.title, a.description, a.icon, ua.unlocked_at
        FROM user_achievements ua
        JOIN achievements a ON a.id = ua.achievement_id
        WHERE ua.user_id = $1
        ORDER BY ua.unlocked_at
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(MeResponse {
        id: user_id,
        profile,
        achievements,
    }))
}

/// The current user's attempts on a day's challenges (today by default).
pub async fn list_my_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());

    let attempts = sqlx::query_as::<_, UserAttempt>(
        r#"
        SELECT id, user_id, challenge_id, challenge_date, difficulty,
               selected_answer, is_correct, points_earned, completed_at
        FROM user_challenge_attempts
        WHERE user_id = $1 AND challenge_date = $2
        ORDER BY completed_at
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(attempts))
}

/// Public catalogue of achievements.
pub async fn list_achievements(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let achievements = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements ORDER BY requirement_value, title",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(achievements))
}
