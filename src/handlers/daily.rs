// src/handlers/daily.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::challenge::{DateQuery, GenerateRequest, PublicChallenge},
    state::AppState,
};

/// Generates the daily challenge set.
///
/// * Body is optional: `{ "date": "YYYY-MM-DD", "force": true }`.
/// * A day that already holds a unique set is left as is.
/// * Returns `{ message, challenges, date, set_used? }`.
pub async fn generate_daily(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
    let outcome = state.daily.generate(date, req.force).await?;

    Ok(Json(outcome.into_response()))
}

/// Lists the challenges of a day (today when no date is given).
/// Answers and explanations stay hidden until the user submits.
pub async fn list_challenges(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());

    let challenges: Vec<PublicChallenge> = state
        .daily
        .store()
        .challenges_for_date(date)
        .await?
        .into_iter()
        .map(PublicChallenge::from)
        .collect();

    Ok(Json(challenges))
}
