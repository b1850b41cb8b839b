//! Date-keyed rotation over the challenge bank.
//!
//! Sets are tried in order starting at `day_key(date) mod N`. The first set
//! with no title or question in recent history wins. When every set conflicts,
//! the set whose titles were served longest ago is used instead.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use super::bank::{ChallengeBank, ChallengeSet};
use super::normalize;
use crate::models::challenge::HistoryRecord;

/// Normalized view of recently served challenges.
#[derive(Debug, Default)]
pub struct RecentHistory {
    titles: HashSet<String>,
    questions: HashSet<String>,
    last_used: HashMap<String, NaiveDate>,
    /// Display titles, most recent first, without duplicates.
    ordered_titles: Vec<String>,
}

impl RecentHistory {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a HistoryRecord>,
    {
        let mut records: Vec<&HistoryRecord> = records.into_iter().collect();
        records.sort_by(|a, b| b.date_assigned.cmp(&a.date_assigned));

        let mut history = RecentHistory::default();
        for r in records {
            let title = normalize(&r.title);
            history.questions.insert(normalize(&r.question));

            let last = history.last_used.entry(title.clone()).or_insert(r.date_assigned);
            if r.date_assigned > *last {
                *last = r.date_assigned;
            }

            if history.titles.insert(title) {
                history.ordered_titles.push(r.title.trim().to_string());
            }
        }
        history
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(&normalize(title))
    }

    pub fn contains_question(&self, question: &str) -> bool {
        self.questions.contains(&normalize(question))
    }

    /// Up to `limit` recent titles, newest first.
    pub fn recent_titles(&self, limit: usize) -> Vec<String> {
        self.ordered_titles.iter().take(limit).cloned().collect()
    }

    fn last_used(&self, set: &ChallengeSet) -> Option<NaiveDate> {
        set.challenges
            .iter()
            .filter_map(|c| self.last_used.get(&normalize(&c.title)).copied())
            .max()
    }

    fn conflicts_with(&self, set: &ChallengeSet) -> bool {
        set.challenges
            .iter()
            .any(|c| self.contains_title(&c.title) || self.contains_question(&c.question))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Conflict-free set found after `attempt` steps of rotation.
    Rotation { attempt: usize },
    LeastRecentlyUsed,
    OnlySet,
}

#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub index: usize,
    pub set: &'a ChallengeSet,
    pub reason: SelectionReason,
}

/// Days since 1970-01-01.
pub fn day_key(date: NaiveDate) -> i64 {
    date.signed_duration_since(NaiveDate::default()).num_days()
}

pub fn select_set<'a>(bank: &'a ChallengeBank, date: NaiveDate, history: &RecentHistory) -> Selection<'a> {
    let sets = bank.sets();
    let n = sets.len();

    if n == 1 {
        return Selection {
            index: 0,
            set: &sets[0],
            reason: SelectionReason::OnlySet,
        };
    }

    let start = day_key(date).rem_euclid(n as i64) as usize;
    for attempt in 0..n {
        let index = (start + attempt) % n;
        if !history.conflicts_with(&sets[index]) {
            tracing::info!(set = index, attempt, "Selected fallback set with no recent conflicts");
            return Selection {
                index,
                set: &sets[index],
                reason: SelectionReason::Rotation { attempt },
            };
        }
    }

    // Never-used sets sort first (None < Some); ties keep the lowest index.
    let index = (0..n)
        .min_by_key(|&i| (history.last_used(&sets[i]), i))
        .unwrap_or(start);
    tracing::info!(set = index, "All sets conflict with recent history, using least recently used");

    Selection {
        index,
        set: &sets[index],
        reason: SelectionReason::LeastRecentlyUsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::challenge::ChallengeTemplate;

    fn template(title: &str) -> ChallengeTemplate {
        ChallengeTemplate {
            title: title.to_string(),
            description: String::new(),
            question: format!("What about {}?", title),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: 0,
            explanation: String::new(),
            hint: String::new(),
        }
    }

    fn bank(n: usize) -> ChallengeBank {
        let sets = (0..n)
            .map(|i| ChallengeSet {
                theme: format!("set {}", i),
                challenges: (0..3).map(|j| template(&format!("S{}-{}", i, j))).collect(),
            })
            .collect();
        ChallengeBank::from_sets(sets).unwrap()
    }

    fn used(bank: &ChallengeBank, set: usize, date: NaiveDate) -> Vec<HistoryRecord> {
        bank.get(set)
            .unwrap()
            .challenges
            .iter()
            .map(|c| HistoryRecord {
                title: c.title.clone(),
                question: c.question.clone(),
                date_assigned: date,
            })
            .collect()
    }

    fn epoch_day(n: i64) -> NaiveDate {
        NaiveDate::default() + chrono::Duration::days(n)
    }

    #[test]
    fn day_key_counts_from_epoch() {
        assert_eq!(day_key(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(day_key(NaiveDate::from_ymd_opt(1971, 1, 6).unwrap()), 370);
    }

    #[test]
    fn empty_history_starts_at_date_key() {
        let bank = bank(7);
        let selection = select_set(&bank, epoch_day(370), &RecentHistory::default());
        assert_eq!(selection.index, 370 % 7);
        assert_eq!(selection.reason, SelectionReason::Rotation { attempt: 0 });
    }

    #[test]
    fn conflicting_sets_are_skipped() {
        let bank = bank(5);
        let date = epoch_day(10); // starts at set 0
        let mut records = used(&bank, 0, epoch_day(9));
        records.extend(used(&bank, 1, epoch_day(8)));
        let history = RecentHistory::from_records(&records);

        let selection = select_set(&bank, date, &history);
        assert_eq!(selection.index, 2);
        assert_eq!(selection.reason, SelectionReason::Rotation { attempt: 2 });
    }

    #[test]
    fn question_match_counts_as_conflict() {
        let bank = bank(3);
        let date = epoch_day(3); // starts at set 0
        let first = &bank.get(0).unwrap().challenges[1];
        let records = vec![HistoryRecord {
            title: "Renamed".to_string(),
            question: format!("  {}  ", first.question.to_uppercase()),
            date_assigned: epoch_day(2),
        }];
        let history = RecentHistory::from_records(&records);

        assert_eq!(select_set(&bank, date, &history).index, 1);
    }

    #[test]
    fn exhausted_bank_uses_least_recently_used() {
        let bank = bank(3);
        let mut records = used(&bank, 0, epoch_day(20));
        records.extend(used(&bank, 1, epoch_day(5)));
        records.extend(used(&bank, 2, epoch_day(12)));
        let history = RecentHistory::from_records(&records);

        let selection = select_set(&bank, epoch_day(21), &history);
        assert_eq!(selection.index, 1);
        assert_eq!(selection.reason, SelectionReason::LeastRecentlyUsed);
    }

    #[test]
    fn partially_used_set_counts_its_latest_use() {
        let bank = bank(2);
        let mut records = used(&bank, 0, epoch_day(4));
        // Set 1 was used long ago, but one of its titles reappeared recently.
        records.extend(used(&bank, 1, epoch_day(1)));
        records.push(HistoryRecord {
            title: bank.get(1).unwrap().challenges[0].title.clone(),
            question: "other".to_string(),
            date_assigned: epoch_day(6),
        });
        let history = RecentHistory::from_records(&records);

        assert_eq!(select_set(&bank, epoch_day(7), &history).index, 0);
    }

    #[test]
    fn single_set_is_always_chosen() {
        let bank = bank(1);
        let history = RecentHistory::from_records(&used(&bank, 0, epoch_day(1)));
        let selection = select_set(&bank, epoch_day(2), &history);
        assert_eq!(selection.index, 0);
        assert_eq!(selection.reason, SelectionReason::OnlySet);
    }

    #[test]
    fn selection_is_deterministic() {
        let bank = bank(6);
        let records = used(&bank, 4, epoch_day(99));
        let history = RecentHistory::from_records(&records);

        let first = select_set(&bank, epoch_day(100), &history).index;
        for _ in 0..10 {
            assert_eq!(select_set(&bank, epoch_day(100), &history).index, first);
        }
    }

    #[test]
    fn recent_titles_are_newest_first_and_unique() {
        let records = vec![
            HistoryRecord { title: "Old".into(), question: "q1".into(), date_assigned: epoch_day(1) },
            HistoryRecord { title: "New".into(), question: "q2".into(), date_assigned: epoch_day(3) },
            HistoryRecord { title: "old ".into(), question: "q3".into(), date_assigned: epoch_day(2) },
        ];
        let history = RecentHistory::from_records(&records);
        assert_eq!(history.recent_titles(10), vec!["New", "old"]);
        assert_eq!(history.recent_titles(1), vec!["New"]);
    }
}
