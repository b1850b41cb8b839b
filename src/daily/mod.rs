//! Daily challenge generation.
//!
//! One run for a day:
//!
//! 1. read the day's stored set and the recent window of history;
//! 2. let the idempotency [`guard`] decide whether the stored set stays;
//! 3. otherwise pick a bank set by [`rotation`], resolve the three slots with
//!    the optional generator ([`resolver`]) and replace the day in one write.
//!
//! No state survives between runs; everything is recomputed from the date and
//! the [`store`].

pub mod bank;
pub mod generator;
pub mod guard;
pub mod resolver;
pub mod rotation;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};

use crate::config::{Config, DEFAULT_GENERATOR_TIMEOUT_SECS};
use crate::error::AppError;
use crate::models::challenge::{Challenge, Difficulty, GenerateResponse, HistoryRecord};

use bank::ChallengeBank;
use generator::ChallengeGenerator;
use guard::{GuardVerdict, RegenerateReason};
use resolver::SlotContext;
use rotation::RecentHistory;
use store::{HistoryStore, ReplaceOutcome};

/// Trimmed, lower-cased form used for every title/question comparison.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct DailySettings {
    pub recent_window_days: u64,
    pub generator_timeout: Duration,
}

impl DailySettings {
    pub fn from_config(config: &Config) -> Self {
        let timeout_secs = config
            .generator
            .as_ref()
            .map(|g| g.timeout_secs)
            .unwrap_or(DEFAULT_GENERATOR_TIMEOUT_SECS);

        Self {
            recent_window_days: config.recent_window_days.max(1) as u64,
            generator_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug)]
pub enum GenerationOutcome {
    /// The stored set passed the guard; nothing was written.
    AlreadyUnique { date: NaiveDate, count: usize },
    Created {
        date: NaiveDate,
        set_used: usize,
        challenges: Vec<Challenge>,
    },
    /// Another run replaced the day first; its set was kept.
    Concurrent { date: NaiveDate, count: usize },
}

impl GenerationOutcome {
    pub fn into_response(self) -> GenerateResponse {
        match self {
            GenerationOutcome::AlreadyUnique { date, count } => GenerateResponse {
                message: "Challenges already exist and are unique".to_string(),
                challenges: count,
                date,
                set_used: None,
            },
            GenerationOutcome::Created {
                date,
                set_used,
                challenges,
            } => GenerateResponse {
                message: "Successfully generated daily challenges".to_string(),
                challenges: challenges.len(),
                date,
                set_used: Some(set_used),
            },
            GenerationOutcome::Concurrent { date, count } => GenerateResponse {
                message: "Challenges were generated concurrently".to_string(),
                challenges: count,
                date,
                set_used: None,
            },
        }
    }
}

pub struct DailyChallengeService {
    store: Arc<dyn HistoryStore>,
    generator: Option<Arc<dyn ChallengeGenerator>>,
    bank: Arc<ChallengeBank>,
    settings: DailySettings,
}

impl DailyChallengeService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        generator: Option<Arc<dyn ChallengeGenerator>>,
        bank: Arc<ChallengeBank>,
        settings: DailySettings,
    ) -> Self {
        Self {
            store,
            generator,
            bank,
            settings,
        }
    }

    pub fn store(&self) -> &dyn HistoryStore {
        self.store.as_ref()
    }

    /// Ensures `date` holds a valid, non-repeating set of three challenges.
    ///
    /// Generator failures never surface here. Errors are store failures and
    /// leave the day as it was before the call.
    pub async fn generate(&self, date: NaiveDate, force: bool) -> Result<GenerationOutcome, AppError> {
        tracing::info!(%date, force, "Starting challenge generation");

        let existing = self.store.challenges_for_date(date).await.map_err(fatal)?;

        let window_start = date
            .checked_sub_days(Days::new(self.settings.recent_window_days))
            .unwrap_or(NaiveDate::MIN);
        let history = self
            .store
            .history_between(window_start, date)
            .await
            .map_err(fatal)?;

        let verdict = if force && !existing.is_empty() {
            GuardVerdict::Regenerate(RegenerateReason::Forced)
        } else {
            let verdict = guard::evaluate(date, &existing, &history);
            self.settle_collision(date, &existing, &history, verdict)
        };

        match &verdict {
            GuardVerdict::Keep => {
                tracing::info!(%date, "Challenges are unique, no regeneration needed");
                return Ok(GenerationOutcome::AlreadyUnique {
                    date,
                    count: existing.len(),
                });
            }
            GuardVerdict::Generate => {}
            GuardVerdict::Regenerate(RegenerateReason::MatchesYesterday) => {
                tracing::warn!(%date, "CRITICAL: today's challenges match yesterday exactly, regenerating");
            }
            GuardVerdict::Regenerate(reason) => {
                tracing::warn!(%date, ?reason, "Regenerating today's challenges");
            }
        }

        // The outgoing set counts as history so a regeneration moves away from it.
        let outgoing: Vec<HistoryRecord> = existing.iter().map(HistoryRecord::from).collect();
        let recent = RecentHistory::from_records(history.iter().chain(outgoing.iter()));

        let selection = rotation::select_set(&self.bank, date, &recent);
        tracing::info!(set = selection.index, theme = %selection.set.theme, reason = ?selection.reason, "Using fallback set");

        let mut rows = Vec::with_capacity(Difficulty::ALL.len());
        for difficulty in Difficulty::ALL {
            let ctx = SlotContext {
                date,
                difficulty,
                fallback: selection.set.template(difficulty),
                recent: &recent,
                timeout: self.settings.generator_timeout,
            };
            let row = resolver::resolve_slot(self.generator.as_deref(), &ctx).await;
            tracing::info!(%difficulty, source = ?row.source, title = %row.title, "Resolved slot");
            rows.push(row);
        }

        let expected: Vec<_> = existing.iter().map(|c| c.id).collect();
        match self
            .store
            .replace_day(date, &expected, &rows)
            .await
            .map_err(fatal)?
        {
            ReplaceOutcome::Replaced(challenges) => {
                tracing::info!(%date, count = challenges.len(), "Successfully generated challenges");
                Ok(GenerationOutcome::Created {
                    date,
                    set_used: selection.index,
                    challenges,
                })
            }
            ReplaceOutcome::Conflict => {
                let count = self.store.challenges_for_date(date).await.map_err(fatal)?.len();
                tracing::warn!(%date, count, "Day was changed by a concurrent run, keeping its set");
                Ok(GenerationOutcome::Concurrent { date, count })
            }
        }
    }

    /// Downgrades a recent-window collision to `Keep` when a fresh run could
    /// not produce a better set.
    fn settle_collision(
        &self,
        date: NaiveDate,
        existing: &[Challenge],
        history: &[HistoryRecord],
        verdict: GuardVerdict,
    ) -> GuardVerdict {
        let title = match verdict {
            GuardVerdict::Regenerate(RegenerateReason::RecentDuplicate { title }) => title,
            other => return other,
        };

        let recent = RecentHistory::from_records(history);
        let best = rotation::select_set(&self.bank, date, &recent);
        if guard::collision_is_unavoidable(existing, &best, &recent, self.generator.is_some()) {
            tracing::info!(%date, %title, set = best.index, "Every bank set was served recently, keeping the stored set");
            GuardVerdict::Keep
        } else {
            GuardVerdict::Regenerate(RegenerateReason::RecentDuplicate { title })
        }
    }
}

fn fatal(err: AppError) -> AppError {
    match err {
        AppError::InternalServerError(msg) => AppError::GenerationFailed(msg),
        other => other,
    }
}
