//! Idempotency guard: decides whether a day's stored set can stay.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};

use super::normalize;
use super::rotation::{RecentHistory, Selection, SelectionReason};
use crate::models::challenge::{Challenge, Difficulty, HistoryRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Nothing stored for the day yet.
    Generate,
    /// The stored set is complete and unique; leave it alone.
    Keep,
    /// The stored set must be replaced.
    Regenerate(RegenerateReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateReason {
    /// Same multiset of titles as the previous day.
    MatchesYesterday,
    /// A stored title was already served inside the recent window.
    RecentDuplicate { title: String },
    /// The day does not hold exactly one challenge per difficulty.
    Incomplete { found: usize },
    Forced,
}

/// `history` must cover the recent window before `today` (today excluded).
pub fn evaluate(today: NaiveDate, existing: &[Challenge], history: &[HistoryRecord]) -> GuardVerdict {
    if existing.is_empty() {
        return GuardVerdict::Generate;
    }

    let difficulties: HashSet<Difficulty> = existing.iter().map(|c| c.difficulty).collect();
    if existing.len() != Difficulty::ALL.len() || difficulties.len() != Difficulty::ALL.len() {
        return GuardVerdict::Regenerate(RegenerateReason::Incomplete {
            found: existing.len(),
        });
    }

    let mut today_titles: Vec<String> = existing.iter().map(|c| normalize(&c.title)).collect();
    today_titles.sort();

    if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
        let mut yesterday_titles: Vec<String> = history
            .iter()
            .filter(|r| r.date_assigned == yesterday)
            .map(|r| normalize(&r.title))
            .collect();
        yesterday_titles.sort();

        if today_titles == yesterday_titles {
            return GuardVerdict::Regenerate(RegenerateReason::MatchesYesterday);
        }
    }

    let recent: HashSet<String> = history
        .iter()
        .filter(|r| r.date_assigned < today)
        .map(|r| normalize(&r.title))
        .collect();

    match existing.iter().find(|c| recent.contains(&normalize(&c.title))) {
        Some(dup) => GuardVerdict::Regenerate(RegenerateReason::RecentDuplicate {
            title: dup.title.clone(),
        }),
        None => GuardVerdict::Keep,
    }
}

/// Whether a day that collides with recent history is already as good as a
/// regeneration could make it.
///
/// `best` is the rotation's pick over the same history, today excluded. Once
/// every bank set was served inside the window, the rotation falls back to
/// the least recently used set and a fresh run would collide all the same.
pub fn collision_is_unavoidable(
    existing: &[Challenge],
    best: &Selection<'_>,
    recent: &RecentHistory,
    has_generator: bool,
) -> bool {
    if let SelectionReason::Rotation { .. } = best.reason {
        return false;
    }
    if !has_generator {
        return true;
    }

    // With a generator, only bank slots can collide; they must be the best set's.
    let best_titles: HashSet<String> = best
        .set
        .challenges
        .iter()
        .map(|c| normalize(&c.title))
        .collect();
    existing
        .iter()
        .filter(|c| recent.contains_title(&c.title))
        .all(|c| best_titles.contains(&normalize(&c.title)))
}
