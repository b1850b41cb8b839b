// src/models/achievement.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'achievements' table (seeded by migration).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,

    /// 'total_points', 'streak_days' or 'challenges_completed'.
    pub requirement_type: String,
    pub requirement_value: i32,

    pub created_at: Option<DateTime<Utc>>,
}

/// An achievement joined with the moment a user unlocked it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UnlockedAchievement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Snapshot of a user's progress right after a correct answer.
#[derive(Debug, Clone, Copy)]
pub struct ProgressStats {
    pub total_points: i32,
    pub current_streak: i32,
    pub challenges_completed: i64,
}

impl Achievement {
    /// Unknown requirement types never unlock.
    pub fn is_met(&self, stats: &ProgressStats) -> bool {
        let required = i64::from(self.requirement_value);
        match self.requirement_type.as_str() {
            "total_points" => i64::from(stats.total_points) >= required,
            "streak_days" => i64::from(stats.current_streak) >= required,
            "challenges_completed" => stats.challenges_completed >= required,
            _ => false,
        }
    }
}

/// Achievements not yet held whose requirement `stats` now satisfies.
pub fn newly_unlocked<'a>(
    all: &'a [Achievement],
    already_unlocked: &HashSet<Uuid>,
    stats: &ProgressStats,
) -> Vec<&'a Achievement> {
    all.iter()
        .filter(|a| !already_unlocked.contains(&a.id))
        .filter(|a| a.is_met(stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn achievement(kind: &str, value: i32) -> Achievement {
        Achievement {
            id: Uuid::new_v4(),
            title: format!("{} {}", kind, value),
            description: String::new(),
            icon: "*".to_string(),
            requirement_type: kind.to_string(),
            requirement_value: value,
            created_at: None,
        }
    }

    fn stats(points: i32, streak: i32, completed: i64) -> ProgressStats {
        ProgressStats {
            total_points: points,
            current_streak: streak,
            challenges_completed: completed,
        }
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert!(achievement("total_points", 100).is_met(&stats(100, 0, 0)));
        assert!(!achievement("total_points", 100).is_met(&stats(90, 0, 0)));
        assert!(achievement("streak_days", 3).is_met(&stats(0, 3, 0)));
        assert!(achievement("challenges_completed", 1).is_met(&stats(0, 0, 1)));
    }

    #[test]
    fn unknown_requirement_never_unlocks() {
        assert!(!achievement("friends_invited", 0).is_met(&stats(1000, 100, 100)));
    }

    #[test]
    fn already_unlocked_are_skipped() {
        let all = vec![achievement("total_points", 10), achievement("streak_days", 1)];
        let held: HashSet<Uuid> = [all[0].id].into_iter().collect();

        let unlocked = newly_unlocked(&all, &held, &stats(50, 1, 1));
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, all[1].id);
    }
}
