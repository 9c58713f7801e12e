//! Achievement rule engine.
//!
//! A fixed declarative table of rules, evaluated uniformly against the
//! aggregate progress after every mutation. Flags only ever flip from false
//! to true; `achieved_date` is stamped once on that transition and survives
//! everything except a full progress reset.

use chrono::{DateTime, Utc};

use crate::models::{Achievement, UserProgress};

/// Achievement unlocked externally when a quiz caller reports 100%.
pub const PERFECT_QUIZ: &str = "perfect_quiz";

/// Predicate variants the rule table can express.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AchievementCondition {
    /// At least this many distinct words tracked.
    WordsLearned(u32),
    /// Global correct streak at or above the threshold.
    CurrentStreak(u32),
    /// At least this many units completed.
    UnitsCompleted(usize),
    /// Cumulative score at or above the threshold.
    TotalScore(i64),
    /// At least this many words at or above the mastery threshold.
    MasteredWords(usize),
    /// At least this many recorded sessions, the long-standing stand-in
    /// for a calendar-day streak.
    SessionsRecorded(usize),
    /// Never met from progress alone; unlocked by an external caller.
    External,
}

pub struct AchievementRule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub condition: AchievementCondition,
}

/// The fixed rule table. Adding an achievement is adding a row; the
/// evaluation loop never changes.
pub const RULES: &[AchievementRule] = &[
    AchievementRule {
        id: "first_word",
        title: "First Word",
        description: "Learn your first word",
        icon: "🌱",
        condition: AchievementCondition::WordsLearned(1),
    },
    AchievementRule {
        id: "streak_5",
        title: "On a Roll",
        description: "Answer 5 in a row correctly",
        icon: "🔥",
        condition: AchievementCondition::CurrentStreak(5),
    },
    AchievementRule {
        id: "streak_10",
        title: "Unstoppable",
        description: "Answer 10 in a row correctly",
        icon: "⚡",
        condition: AchievementCondition::CurrentStreak(10),
    },
    AchievementRule {
        id: "first_unit",
        title: "Unit Complete",
        description: "Finish your first unit",
        icon: "📘",
        condition: AchievementCondition::UnitsCompleted(1),
    },
    AchievementRule {
        id: "score_100",
        title: "Century",
        description: "Earn 100 points",
        icon: "💯",
        condition: AchievementCondition::TotalScore(100),
    },
    AchievementRule {
        id: "score_500",
        title: "High Scorer",
        description: "Earn 500 points",
        icon: "🏅",
        condition: AchievementCondition::TotalScore(500),
    },
    AchievementRule {
        id: "score_1000",
        title: "Point Master",
        description: "Earn 1000 points",
        icon: "🏆",
        condition: AchievementCondition::TotalScore(1000),
    },
    AchievementRule {
        id: "mastery_10",
        title: "Word Master",
        description: "Master 10 words",
        icon: "🎓",
        condition: AchievementCondition::MasteredWords(10),
    },
    AchievementRule {
        id: "week_streak",
        title: "Dedicated",
        description: "Study 7 days in a row",
        icon: "📅",
        condition: AchievementCondition::SessionsRecorded(7),
    },
    AchievementRule {
        id: PERFECT_QUIZ,
        title: "Perfectionist",
        description: "Score 100% on a quiz",
        icon: "⭐",
        condition: AchievementCondition::External,
    },
];

/// Locked copies of every achievement in the rule table.
pub fn default_achievements() -> Vec<Achievement> {
    RULES
        .iter()
        .map(|rule| Achievement {
            id: rule.id.to_string(),
            title: rule.title.to_string(),
            description: rule.description.to_string(),
            icon: rule.icon.to_string(),
            achieved: false,
            achieved_date: None,
        })
        .collect()
}

/// Whether a condition holds for the given progress snapshot.
pub fn condition_met(condition: AchievementCondition, progress: &UserProgress) -> bool {
    match condition {
        AchievementCondition::WordsLearned(min) => progress.words_learned >= min,
        AchievementCondition::CurrentStreak(min) => progress.current_streak >= min,
        AchievementCondition::UnitsCompleted(min) => progress.units_completed.len() >= min,
        AchievementCondition::TotalScore(min) => progress.total_score >= min,
        AchievementCondition::MasteredWords(min) => progress.words_mastered() >= min,
        AchievementCondition::SessionsRecorded(min) => progress.study_sessions.len() >= min,
        AchievementCondition::External => false,
    }
}

/// Evaluate every locked achievement against the snapshot, unlocking the
/// ones whose condition now holds. Returns the newly unlocked ids.
pub fn evaluate(
    progress: &UserProgress,
    achievements: &mut [Achievement],
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut unlocked = Vec::new();
    for achievement in achievements.iter_mut() {
        if achievement.achieved {
            continue;
        }
        let Some(rule) = RULES.iter().find(|rule| rule.id == achievement.id) else {
            continue;
        };
        if condition_met(rule.condition, progress) {
            achievement.achieved = true;
            achievement.achieved_date = Some(now);
            tracing::info!(achievement = %achievement.id, "achievement unlocked");
            unlocked.push(achievement.id.clone());
        }
    }
    unlocked
}

/// Unlock a specific achievement directly, the perfect-quiz path. Returns
/// true when the flag flipped, false when it was already achieved or the id
/// is unknown.
pub fn unlock(achievements: &mut [Achievement], id: &str, now: DateTime<Utc>) -> bool {
    match achievements.iter_mut().find(|achievement| achievement.id == id) {
        Some(achievement) if !achievement.achieved => {
            achievement.achieved = true;
            achievement.achieved_date = Some(now);
            tracing::info!(achievement = %id, "achievement unlocked");
            true
        }
        _ => false,
    }
}
