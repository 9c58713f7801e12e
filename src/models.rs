//! Core data model for learner progress tracking.
//!
//! Every persisted type serializes with camelCase field names so snapshots
//! match the records the web and desktop clients exchange.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall mastery at or above this level means the word no longer needs
/// review.
pub const MASTERY_THRESHOLD: u8 = 80;

// ========== Activities ==========

/// Skill dimension exercised by an answer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Pronunciation,
    Spelling,
    Usage,
    Grammar,
    /// Generic event not attributed to a single skill dimension.
    Mixed,
}

impl ActivityType {
    pub fn from_str(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pronunciation" => Self::Pronunciation,
            "spelling" => Self::Spelling,
            "usage" => Self::Usage,
            "grammar" => Self::Grammar,
            _ => Self::Mixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pronunciation => "pronunciation",
            Self::Spelling => "spelling",
            Self::Usage => "usage",
            Self::Grammar => "grammar",
            Self::Mixed => "mixed",
        }
    }
}

// ========== Word mastery ==========

/// Snapshot of the dimension scores after one answer event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub timestamp: DateTime<Utc>,
    pub pronunciation_mastery: u8,
    pub spelling_mastery: u8,
    pub usage_mastery: u8,
    pub grammar_mastery: u8,
    pub overall_mastery: u8,
    pub activity_type: ActivityType,
}

/// Per-word mastery state, one per distinct vocabulary item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordKnowledge {
    pub word_id: String,
    pub pronunciation_mastery: u8,
    pub spelling_mastery: u8,
    pub usage_mastery: u8,
    pub grammar_mastery: u8,
    /// Rounded mean of the four dimensions. Recomputed on every answer
    /// event, never trusted from storage.
    pub overall_mastery: u8,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Consecutive correct answers; reset to zero by any incorrect answer.
    pub streak: u32,
    pub best_streak: u32,
    pub review_count: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub needs_review: bool,
    /// Most recent answer events, oldest evicted first.
    pub mastery_history: VecDeque<MasteryRecord>,
}

// ========== Study sessions ==========

/// One study session, either still open or already ended. Score awards are
/// also recorded as degenerate zero-duration sessions so subject and unit
/// aggregations can find them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds, computed once when the session ends.
    pub duration: i64,
    /// Distinct word ids touched during the session, in first-seen order.
    pub words_studied: Vec<String>,
    pub total_score: i64,
    /// Distinct activity, subject and unit tags accumulated by the session.
    pub activities_completed: Vec<String>,
    pub user_id: Option<String>,
}

// ========== Achievements ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub achieved: bool,
    /// Stamped once when `achieved` flips to true; never cleared afterwards
    /// short of a full progress reset.
    pub achieved_date: Option<DateTime<Utc>>,
}

// ========== Aggregate progress ==========

/// Aggregate progress for one learner scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: Option<String>,
    /// Cumulative score; negative awards are applied as-is, so the total
    /// can go negative.
    pub total_score: i64,
    /// Global correct-answer streak, independent of per-word streaks.
    pub current_streak: u32,
    /// Completed unit keys (`subject:unit` or bare unit), duplicate-free.
    pub units_completed: Vec<String>,
    /// Number of distinct words ever tracked.
    pub words_learned: u32,
    pub last_study_date: Option<DateTime<Utc>>,
    pub word_progress: HashMap<String, WordKnowledge>,
    pub study_sessions: Vec<StudySession>,
    /// Accumulated duration of ended sessions, in seconds.
    pub total_study_time: i64,
}

impl UserProgress {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            total_score: 0,
            current_streak: 0,
            units_completed: Vec::new(),
            words_learned: 0,
            last_study_date: None,
            word_progress: HashMap::new(),
            study_sessions: Vec::new(),
            total_study_time: 0,
        }
    }

    /// Record a unit as completed. Returns false when the key was already
    /// present; repeat completions earn no duplicate credit.
    pub fn complete_unit(&mut self, key: String) -> bool {
        if self.units_completed.iter().any(|existing| existing == &key) {
            return false;
        }
        self.units_completed.push(key);
        true
    }

    /// Number of words whose overall mastery has reached the review
    /// threshold.
    pub fn words_mastered(&self) -> usize {
        self.word_progress
            .values()
            .filter(|knowledge| knowledge.overall_mastery >= MASTERY_THRESHOLD)
            .count()
    }
}

// ========== Read models ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStatistics {
    pub total_sessions: i64,
    pub total_study_time: i64,
    /// Mean duration of ended sessions in seconds; 0.0 when none ended.
    pub average_session_duration: f64,
    pub total_score: i64,
    pub current_streak: u32,
    pub words_learned: u32,
    pub words_mastered: i64,
    pub units_completed: i64,
    pub last_study_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub subject: String,
    pub total_score: i64,
    pub sessions: i64,
    pub units_completed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    pub subject: String,
    pub unit: String,
    pub completed: bool,
    pub total_score: i64,
    pub sessions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_type_round_trips_through_str() {
        for activity in [
            ActivityType::Pronunciation,
            ActivityType::Spelling,
            ActivityType::Usage,
            ActivityType::Grammar,
            ActivityType::Mixed,
        ] {
            assert_eq!(ActivityType::from_str(activity.as_str()), activity);
        }
    }

    #[test]
    fn unknown_activity_falls_back_to_mixed() {
        assert_eq!(ActivityType::from_str("listening"), ActivityType::Mixed);
        assert_eq!(ActivityType::from_str(""), ActivityType::Mixed);
    }

    #[test]
    fn word_knowledge_serializes_camel_case() {
        let knowledge = WordKnowledge {
            word_id: "welcome".to_string(),
            pronunciation_mastery: 0,
            spelling_mastery: 10,
            usage_mastery: 0,
            grammar_mastery: 0,
            overall_mastery: 3,
            correct_answers: 1,
            incorrect_answers: 0,
            streak: 1,
            best_streak: 1,
            review_count: 1,
            last_reviewed: None,
            needs_review: true,
            mastery_history: VecDeque::new(),
        };
        let value = serde_json::to_value(&knowledge).unwrap();
        assert!(value.get("wordId").is_some(), "expected camelCase wordId");
        assert!(value.get("spellingMastery").is_some());
        assert!(value.get("needsReview").is_some());
        assert!(value.get("masteryHistory").is_some());
        assert!(value.get("word_id").is_none(), "snake_case must not appear");
    }

    #[test]
    fn session_and_achievement_serialize_camel_case() {
        let session = StudySession {
            id: "s-1".to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration: 0,
            words_studied: Vec::new(),
            total_score: 0,
            activities_completed: Vec::new(),
            user_id: None,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("startTime").is_some());
        assert!(value.get("wordsStudied").is_some());

        let achievement = Achievement {
            id: "first_word".to_string(),
            title: "First Word".to_string(),
            description: "Learn your first word".to_string(),
            icon: "X".to_string(),
            achieved: false,
            achieved_date: None,
        };
        let value = serde_json::to_value(&achievement).unwrap();
        assert!(value.get("achievedDate").is_some());
    }

    #[test]
    fn complete_unit_is_idempotent() {
        let mut progress = UserProgress::new(None);
        assert!(progress.complete_unit("math:unit-1".to_string()));
        assert!(!progress.complete_unit("math:unit-1".to_string()));
        assert!(progress.complete_unit("unit-2".to_string()));
        assert_eq!(progress.units_completed.len(), 2);
    }

    #[test]
    fn words_mastered_counts_threshold_and_above() {
        let mut progress = UserProgress::new(None);
        for (word, overall) in [("a", 79u8), ("b", 80), ("c", 100)] {
            progress.word_progress.insert(
                word.to_string(),
                WordKnowledge {
                    word_id: word.to_string(),
                    pronunciation_mastery: overall,
                    spelling_mastery: overall,
                    usage_mastery: overall,
                    grammar_mastery: overall,
                    overall_mastery: overall,
                    correct_answers: 0,
                    incorrect_answers: 0,
                    streak: 0,
                    best_streak: 0,
                    review_count: 0,
                    last_reviewed: None,
                    needs_review: overall < MASTERY_THRESHOLD,
                    mastery_history: VecDeque::new(),
                },
            );
        }
        assert_eq!(progress.words_mastered(), 2, "79 is below the threshold");
    }
}
