//! Mastery scoring engine.
//!
//! Pure functions over [`WordKnowledge`]. The event time is a parameter and
//! no storage is touched, so every rule is unit-testable in isolation.
//!
//! Scoring rules:
//! - a correct answer raises the answered dimension by `min(10, 20 - prior)`
//!   where `prior` is the number of correct answers before this one, so
//!   gains diminish after the tenth and vanish past the twentieth
//! - an incorrect answer lowers the dimension by a flat 5, floored at 0
//! - `overall_mastery` is always the rounded mean of the four dimensions
//! - every event appends a history record, capped at the most recent
//!   [`MAX_HISTORY`] entries

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::models::{ActivityType, MasteryRecord, WordKnowledge, MASTERY_THRESHOLD};

/// Maximum mastery records retained per word.
pub const MAX_HISTORY: usize = 20;

/// Flat penalty applied to a dimension on an incorrect answer.
const INCORRECT_PENALTY: i32 = 5;

/// Fresh state for a word that has never been answered.
pub fn initialize(word_id: &str) -> WordKnowledge {
    WordKnowledge {
        word_id: word_id.to_string(),
        pronunciation_mastery: 0,
        spelling_mastery: 0,
        usage_mastery: 0,
        grammar_mastery: 0,
        overall_mastery: 0,
        correct_answers: 0,
        incorrect_answers: 0,
        streak: 0,
        best_streak: 0,
        review_count: 0,
        last_reviewed: None,
        needs_review: true,
        mastery_history: VecDeque::new(),
    }
}

/// Apply a correct answer for the given activity.
pub fn record_correct(knowledge: &mut WordKnowledge, activity: ActivityType, now: DateTime<Utc>) {
    let prior = knowledge.correct_answers;
    knowledge.correct_answers += 1;
    knowledge.streak += 1;
    knowledge.best_streak = knowledge.best_streak.max(knowledge.streak);

    // Full 10 points for the first ten correct answers, one point less per
    // answer after that, zero at twenty and negative beyond. The dimension
    // clamp keeps the stored value in range either way.
    let increase = (20 - prior as i32).min(10);
    adjust_dimension(knowledge, activity, increase);
    finish_event(knowledge, activity, now);
}

/// Apply an incorrect answer for the given activity.
pub fn record_incorrect(knowledge: &mut WordKnowledge, activity: ActivityType, now: DateTime<Utc>) {
    knowledge.incorrect_answers += 1;
    knowledge.streak = 0;
    adjust_dimension(knowledge, activity, -INCORRECT_PENALTY);
    finish_event(knowledge, activity, now);
    // An incorrect answer always flags the word, even at high mastery.
    knowledge.needs_review = true;
}

/// Rounded mean of the four dimension scores.
pub fn overall_mastery(knowledge: &WordKnowledge) -> u8 {
    let sum = knowledge.pronunciation_mastery as f64
        + knowledge.spelling_mastery as f64
        + knowledge.usage_mastery as f64
        + knowledge.grammar_mastery as f64;
    (sum / 4.0).round() as u8
}

fn adjust_dimension(knowledge: &mut WordKnowledge, activity: ActivityType, delta: i32) {
    let slot = match activity {
        ActivityType::Pronunciation => &mut knowledge.pronunciation_mastery,
        ActivityType::Spelling => &mut knowledge.spelling_mastery,
        ActivityType::Usage => &mut knowledge.usage_mastery,
        ActivityType::Grammar => &mut knowledge.grammar_mastery,
        // Mixed events update counters and history without attributing the
        // answer to a single skill.
        ActivityType::Mixed => return,
    };
    *slot = (*slot as i32 + delta).clamp(0, 100) as u8;
}

/// Shared bookkeeping for both answer kinds: recompute the overall score,
/// append a history record, bump the review counters and the review flag.
fn finish_event(knowledge: &mut WordKnowledge, activity: ActivityType, now: DateTime<Utc>) {
    knowledge.overall_mastery = overall_mastery(knowledge);
    knowledge.mastery_history.push_back(MasteryRecord {
        timestamp: now,
        pronunciation_mastery: knowledge.pronunciation_mastery,
        spelling_mastery: knowledge.spelling_mastery,
        usage_mastery: knowledge.usage_mastery,
        grammar_mastery: knowledge.grammar_mastery,
        overall_mastery: knowledge.overall_mastery,
        activity_type: activity,
    });
    while knowledge.mastery_history.len() > MAX_HISTORY {
        knowledge.mastery_history.pop_front();
    }
    knowledge.review_count += 1;
    knowledge.last_reviewed = Some(now);
    knowledge.needs_review = knowledge.overall_mastery < MASTERY_THRESHOLD;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn first_correct_spelling_answer() {
        let mut knowledge = initialize("welcome");
        record_correct(&mut knowledge, ActivityType::Spelling, base_time());

        assert_eq!(knowledge.spelling_mastery, 10);
        assert_eq!(knowledge.pronunciation_mastery, 0);
        assert_eq!(
            knowledge.overall_mastery, 3,
            "10 / 4 = 2.5 rounds half away from zero"
        );
        assert_eq!(knowledge.correct_answers, 1);
        assert_eq!(knowledge.streak, 1);
        assert_eq!(knowledge.best_streak, 1);
        assert_eq!(knowledge.review_count, 1);
        assert_eq!(knowledge.last_reviewed, Some(base_time()));
        assert!(knowledge.needs_review, "3 is far below the threshold");
        assert_eq!(knowledge.mastery_history.len(), 1);
    }

    #[test]
    fn ten_correct_answers_saturate_the_dimension() {
        let mut knowledge = initialize("welcome");
        for step in 0..10 {
            let now = base_time() + Duration::seconds(step);
            record_correct(&mut knowledge, ActivityType::Spelling, now);
        }

        assert_eq!(knowledge.spelling_mastery, 100, "ten full increments");
        assert_eq!(knowledge.overall_mastery, 25);
        assert_eq!(knowledge.correct_answers, 10);
        assert_eq!(knowledge.streak, 10);
        assert!(knowledge.needs_review, "other dimensions still drag overall down");
    }

    #[test]
    fn increase_diminishes_after_ten_answers() {
        let mut knowledge = initialize("word");
        knowledge.correct_answers = 11;
        record_correct(&mut knowledge, ActivityType::Usage, base_time());
        // prior = 11, so the increase is 20 - 11 = 9.
        assert_eq!(knowledge.usage_mastery, 9);
    }

    #[test]
    fn increase_goes_negative_past_twenty_answers() {
        let mut knowledge = initialize("word");
        knowledge.correct_answers = 25;
        knowledge.grammar_mastery = 50;
        record_correct(&mut knowledge, ActivityType::Grammar, base_time());
        // prior = 25 gives an increase of -5; the correct counter still
        // advances and the streak still grows.
        assert_eq!(knowledge.grammar_mastery, 45);
        assert_eq!(knowledge.correct_answers, 26);
        assert_eq!(knowledge.streak, 1);

        knowledge.grammar_mastery = 3;
        record_correct(&mut knowledge, ActivityType::Grammar, base_time());
        assert_eq!(knowledge.grammar_mastery, 0, "clamped at the floor");
    }

    #[test]
    fn mixed_activity_touches_no_dimension() {
        let mut knowledge = initialize("word");
        record_correct(&mut knowledge, ActivityType::Mixed, base_time());

        assert_eq!(knowledge.pronunciation_mastery, 0);
        assert_eq!(knowledge.spelling_mastery, 0);
        assert_eq!(knowledge.usage_mastery, 0);
        assert_eq!(knowledge.grammar_mastery, 0);
        assert_eq!(knowledge.overall_mastery, 0);
        assert_eq!(knowledge.correct_answers, 1, "counters still advance");
        assert_eq!(knowledge.mastery_history.len(), 1, "history still records");
    }

    #[test]
    fn incorrect_answer_resets_streak_and_floors_at_zero() {
        let mut knowledge = initialize("word");
        record_correct(&mut knowledge, ActivityType::Spelling, base_time());
        record_correct(&mut knowledge, ActivityType::Spelling, base_time());
        assert_eq!(knowledge.streak, 2);

        record_incorrect(&mut knowledge, ActivityType::Spelling, base_time());
        assert_eq!(knowledge.spelling_mastery, 15);
        assert_eq!(knowledge.streak, 0);
        assert_eq!(knowledge.best_streak, 2, "best streak is a high-water mark");
        assert_eq!(knowledge.incorrect_answers, 1);

        record_incorrect(&mut knowledge, ActivityType::Usage, base_time());
        assert_eq!(knowledge.usage_mastery, 0, "cannot go below zero");
    }

    #[test]
    fn incorrect_answer_flags_review_even_at_high_mastery() {
        let mut knowledge = initialize("word");
        knowledge.pronunciation_mastery = 100;
        knowledge.spelling_mastery = 100;
        knowledge.usage_mastery = 100;
        knowledge.grammar_mastery = 100;

        record_incorrect(&mut knowledge, ActivityType::Spelling, base_time());
        assert_eq!(knowledge.spelling_mastery, 95);
        assert!(
            knowledge.overall_mastery >= MASTERY_THRESHOLD,
            "overall stays high: {}",
            knowledge.overall_mastery
        );
        assert!(knowledge.needs_review, "incorrect forces the flag regardless");
    }

    #[test]
    fn history_evicts_oldest_past_the_cap() {
        let mut knowledge = initialize("word");
        for step in 0..30 {
            let now = base_time() + Duration::seconds(step);
            record_correct(&mut knowledge, ActivityType::Spelling, now);
        }

        assert_eq!(knowledge.mastery_history.len(), MAX_HISTORY);
        let oldest = knowledge.mastery_history.front().unwrap();
        assert_eq!(
            oldest.timestamp,
            base_time() + Duration::seconds(10),
            "the first ten records were evicted"
        );
        let newest = knowledge.mastery_history.back().unwrap();
        assert_eq!(newest.timestamp, base_time() + Duration::seconds(29));
    }

    #[test]
    fn overall_mastery_rounds_half_away_from_zero() {
        let mut knowledge = initialize("word");
        knowledge.pronunciation_mastery = 0;
        knowledge.spelling_mastery = 0;
        knowledge.usage_mastery = 5;
        knowledge.grammar_mastery = 5;
        assert_eq!(overall_mastery(&knowledge), 3, "2.5 rounds up");

        knowledge.usage_mastery = 5;
        knowledge.grammar_mastery = 0;
        assert_eq!(overall_mastery(&knowledge), 1, "1.25 rounds down");
    }
}
