//! History store: the log of assigned challenges, keyed by day.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::challenge::{CHALLENGE_TYPE, Challenge, HistoryRecord, NewChallenge};

/// Namespace for the per-day advisory lock taken while replacing a day.
const DAY_LOCK_NAMESPACE: i32 = 0x4443; // "DC"

const CHALLENGE_COLUMNS: &str = "id, title, description, question, options, correct_answer, \
     explanation, hint, difficulty, points, challenge_type, date_assigned, created_at";

#[derive(Debug)]
pub enum ReplaceOutcome {
    /// The day now holds exactly the inserted rows.
    Replaced(Vec<Challenge>),
    /// The day changed since it was read; nothing was written.
    Conflict,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Challenges assigned to `date`, in difficulty order.
    async fn challenges_for_date(&self, date: NaiveDate) -> Result<Vec<Challenge>, AppError>;

    /// Title/question/date of every challenge assigned in `[from, to)`.
    async fn history_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryRecord>, AppError>;

    /// Atomically deletes the rows of `date` and inserts `rows`, provided the
    /// ids currently stored for `date` are exactly `expected`.
    async fn replace_day(
        &self,
        date: NaiveDate,
        expected: &[Uuid],
        rows: &[NewChallenge],
    ) -> Result<ReplaceOutcome, AppError>;
}

#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Same id set regardless of order.
pub fn same_ids(current: &[Uuid], expected: &[Uuid]) -> bool {
    let mut a = current.to_vec();
    let mut b = expected.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn challenges_for_date(&self, date: NaiveDate) -> Result<Vec<Challenge>, AppError> {
        let sql = format!(
            "SELECT {} FROM challenges WHERE date_assigned = $1 \
             ORDER BY CASE difficulty WHEN 'Easy' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, created_at",
            CHALLENGE_COLUMNS
        );

        let challenges = sqlx::query_as::<_, Challenge>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch challenges for {}: {:?}", date, e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(challenges)
    }

    async fn history_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryRecord>, AppError> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT title, question, date_assigned
            FROM challenges
            WHERE date_assigned >= $1 AND date_assigned < $2
            ORDER BY date_assigned DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch challenge history: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(records)
    }

    async fn replace_day(
        &self,
        date: NaiveDate,
        expected: &[Uuid],
        rows: &[NewChallenge],
    ) -> Result<ReplaceOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent generations for the same day until commit.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(DAY_LOCK_NAMESPACE)
            .bind(date.num_days_from_ce())
            .execute(&mut *tx)
            .await?;

        let current: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM challenges WHERE date_assigned = $1")
                .bind(date)
                .fetch_all(&mut *tx)
                .await?;

        if !same_ids(&current, expected) {
            tx.rollback().await?;
            return Ok(ReplaceOutcome::Conflict);
        }

        sqlx::query("DELETE FROM challenges WHERE date_assigned = $1")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO challenges (id, title, description, question, options, correct_answer, \
             explanation, hint, difficulty, points, challenge_type, date_assigned) ",
        );
        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(Uuid::new_v4())
                .push_bind(row.title.clone())
                .push_bind(row.description.clone())
                .push_bind(row.question.clone())
                .push_bind(Json(row.options.clone()))
                .push_bind(row.correct_answer as i32)
                .push_bind(row.explanation.clone())
                .push_bind(row.hint.clone())
                .push_bind(row.difficulty.as_str())
                .push_bind(row.points)
                .push_bind(CHALLENGE_TYPE)
                .push_bind(row.date_assigned);
        });
        query_builder.push(" RETURNING ");
        query_builder.push(CHALLENGE_COLUMNS);

        let inserted = query_builder
            .build_query_as::<Challenge>()
            .fetch_all(&mut *tx)
            .await;

        let mut inserted = match inserted {
            Ok(rows) => rows,
            Err(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                tracing::warn!("Challenges for {} were inserted concurrently", date);
                tx.rollback().await?;
                return Ok(ReplaceOutcome::Conflict);
            }
            Err(e) => {
                tracing::error!("Failed to insert challenges for {}: {:?}", date, e);
                return Err(AppError::InternalServerError(e.to_string()));
            }
        };

        tx.commit().await?;

        inserted.sort_by_key(|c| c.difficulty);
        Ok(ReplaceOutcome::Replaced(inserted))
    }
}
