//! Progress manager, the caller-facing facade.
//!
//! Owns the live [`UserProgress`], the achievement flags and the session
//! tracker for one learner scope. Mutations update the in-memory state
//! synchronously, re-evaluate the achievement table, then queue a durable
//! write; callers never wait on storage. A crash between mutation and save
//! loses at most that increment.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::achievements::{self, PERFECT_QUIZ};
use crate::mastery;
use crate::models::{
    Achievement, ActivityType, StudySession, StudyStatistics, SubjectProgress, UnitProgress,
    UserProgress, WordKnowledge,
};
use crate::session::{SessionError, SessionTracker};
use crate::store::{ProgressSnapshot, ProgressStore, Scope};

struct ManagerState {
    progress: UserProgress,
    achievements: Vec<Achievement>,
    tracker: SessionTracker,
    /// Ids unlocked since the last [`ProgressManager::take_newly_unlocked`]
    /// call, in unlock order. Transient, never persisted.
    newly_unlocked: Vec<String>,
}

impl ManagerState {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress.clone(),
            achievements: self.achievements.clone(),
        }
    }
}

pub struct ProgressManager {
    scope: Scope,
    store: Arc<ProgressStore>,
    state: Arc<RwLock<ManagerState>>,
}

impl ProgressManager {
    /// Load (or initialize) the progress for a scope.
    pub async fn load(scope: Scope, store: Arc<ProgressStore>) -> Self {
        let mut snapshot = store.load(&scope).await;
        // The overall score is derived state; recompute it instead of
        // trusting whatever the stored record claims.
        for knowledge in snapshot.progress.word_progress.values_mut() {
            knowledge.overall_mastery = mastery::overall_mastery(knowledge);
        }
        let tracker = SessionTracker::new(scope.user_id().map(str::to_string));
        Self {
            scope,
            store,
            state: Arc::new(RwLock::new(ManagerState {
                progress: snapshot.progress,
                achievements: snapshot.achievements,
                tracker,
                newly_unlocked: Vec::new(),
            })),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Run a mutation under the write lock, re-evaluate the achievement
    /// table and queue the durable write.
    async fn mutate<T>(&self, apply: impl FnOnce(&mut ManagerState) -> T) -> T {
        let snapshot;
        let result;
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            result = apply(state);
            let unlocked =
                achievements::evaluate(&state.progress, &mut state.achievements, Utc::now());
            state.newly_unlocked.extend(unlocked);
            snapshot = state.snapshot();
        }
        self.queue_save(snapshot);
        result
    }

    /// Fire-and-forget durable write; failures are logged, never surfaced.
    fn queue_save(&self, snapshot: ProgressSnapshot) {
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();
        tokio::spawn(async move {
            if let Err(err) = store.save(&scope, &snapshot).await {
                tracing::warn!(error = %err, "progress save failed");
            }
        });
    }

    // ========== Score, streak and units ==========

    /// Award points. Negative values are accepted and subtracted; the total
    /// is not floored at zero.
    pub async fn add_score(&self, points: i64, subject: Option<&str>, unit: Option<&str>) {
        let now = Utc::now();
        let user_id = self.scope.user_id().map(str::to_string);
        self.mutate(move |state| {
            state.progress.total_score += points;
            state.progress.last_study_date = Some(now);

            // Score awards are recorded as degenerate zero-duration sessions
            // so subject and unit aggregations can find them later.
            let mut tags = Vec::new();
            if let Some(subject) = subject {
                tags.push(subject.to_string());
            }
            if let Some(unit) = unit {
                tags.push(unit_key(subject, unit));
            }
            state.progress.study_sessions.push(StudySession {
                id: Uuid::new_v4().to_string(),
                start_time: now,
                end_time: Some(now),
                duration: 0,
                words_studied: Vec::new(),
                total_score: points,
                activities_completed: tags,
                user_id,
            });
        })
        .await;
    }

    /// Advance or reset the global answer streak.
    pub async fn update_streak(&self, correct: bool) {
        self.mutate(|state| {
            if correct {
                state.progress.current_streak += 1;
            } else {
                state.progress.current_streak = 0;
            }
        })
        .await;
    }

    /// Mark a unit as completed under its composite key.
    pub async fn complete_unit(&self, unit: &str, subject: Option<&str>) {
        let key = unit_key(subject, unit);
        self.mutate(move |state| {
            state.progress.complete_unit(key);
        })
        .await;
    }

    // ========== Answer events ==========

    /// Score a correct answer for a word. Returns the updated word state.
    pub async fn record_correct_answer(
        &self,
        word_id: &str,
        activity: ActivityType,
    ) -> WordKnowledge {
        self.record_answer(word_id, activity, true).await
    }

    /// Score an incorrect answer for a word. Returns the updated word state.
    pub async fn record_incorrect_answer(
        &self,
        word_id: &str,
        activity: ActivityType,
    ) -> WordKnowledge {
        self.record_answer(word_id, activity, false).await
    }

    async fn record_answer(
        &self,
        word_id: &str,
        activity: ActivityType,
        correct: bool,
    ) -> WordKnowledge {
        let now = Utc::now();
        let word = word_id.to_string();
        self.mutate(move |state| {
            if !state.progress.word_progress.contains_key(&word) {
                state.progress.words_learned += 1;
            }
            let knowledge = state
                .progress
                .word_progress
                .entry(word.clone())
                .or_insert_with(|| mastery::initialize(&word));
            if correct {
                mastery::record_correct(knowledge, activity, now);
            } else {
                mastery::record_incorrect(knowledge, activity, now);
            }
            let updated = knowledge.clone();

            // An answer without an open session is a normal quick-review
            // flow, not an error.
            let _ = state.tracker.touch(&word, activity.as_str());
            state.progress.last_study_date = Some(now);
            updated
        })
        .await
    }

    // ========== Study sessions ==========

    /// Open a study session. Fails when one is already open. Opening is not
    /// itself a progress mutation; nothing is persisted until the session
    /// accumulates state.
    pub async fn start_study_session(&self) -> Result<StudySession, SessionError> {
        let now = Utc::now();
        let mut guard = self.state.write().await;
        guard.tracker.start(now)
    }

    /// Close the open session, fold it into the aggregate and persist.
    pub async fn end_study_session(&self) -> Result<StudySession, SessionError> {
        let now = Utc::now();
        let snapshot;
        let finished;
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            finished = state.tracker.end(now)?;
            state.progress.study_sessions.push(finished.clone());
            state.progress.total_study_time += finished.duration;
            state.progress.last_study_date = Some(now);
            let unlocked = achievements::evaluate(&state.progress, &mut state.achievements, now);
            state.newly_unlocked.extend(unlocked);
            snapshot = state.snapshot();
        }
        self.queue_save(snapshot);
        Ok(finished)
    }

    // ========== Quizzes ==========

    /// Report a finished quiz. A perfect score unlocks the corresponding
    /// achievement; anything less changes nothing. Returns whether the
    /// achievement was newly unlocked.
    pub async fn record_quiz_result(&self, correct: u32, total: u32) -> bool {
        if total == 0 || correct != total {
            return false;
        }
        let now = Utc::now();
        self.mutate(move |state| {
            let flipped = achievements::unlock(&mut state.achievements, PERFECT_QUIZ, now);
            if flipped {
                state.newly_unlocked.push(PERFECT_QUIZ.to_string());
            }
            flipped
        })
        .await
    }

    // ========== Reset ==========

    /// Wipe all progress and achievements, persisting the reset to both
    /// stores before returning.
    pub async fn reset_progress(&self) {
        let snapshot;
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            state.progress = UserProgress::new(self.scope.user_id().map(str::to_string));
            state.achievements = achievements::default_achievements();
            state.tracker.clear();
            state.newly_unlocked.clear();
            snapshot = state.snapshot();
        }
        if let Err(err) = self.store.save_to_all_targets(&self.scope, &snapshot).await {
            tracing::warn!(error = %err, "failed to persist progress reset");
        }
        tracing::info!("progress reset");
    }

    // ========== Read side ==========

    pub async fn progress(&self) -> UserProgress {
        self.state.read().await.progress.clone()
    }

    pub async fn achievements(&self) -> Vec<Achievement> {
        self.state.read().await.achievements.clone()
    }

    /// Drain the achievement ids unlocked since the last call, in unlock
    /// order. Callers surface these as one-shot notifications.
    pub async fn take_newly_unlocked(&self) -> Vec<String> {
        let mut guard = self.state.write().await;
        std::mem::take(&mut guard.newly_unlocked)
    }

    /// Aggregate score, session count and completed units for one subject.
    pub async fn get_subject_progress(&self, subject: &str) -> SubjectProgress {
        let state = self.state.read().await;
        let tagged: Vec<&StudySession> = state
            .progress
            .study_sessions
            .iter()
            .filter(|session| session.activities_completed.iter().any(|tag| tag == subject))
            .collect();
        let unit_prefix = format!("{subject}:");
        SubjectProgress {
            subject: subject.to_string(),
            total_score: tagged.iter().map(|session| session.total_score).sum(),
            sessions: tagged.len() as i64,
            units_completed: state
                .progress
                .units_completed
                .iter()
                .filter(|key| key.starts_with(&unit_prefix))
                .cloned()
                .collect(),
        }
    }

    /// Completion flag and accumulated score for one unit of a subject.
    pub async fn get_unit_progress(&self, subject: &str, unit: &str) -> UnitProgress {
        let key = unit_key(Some(subject), unit);
        let state = self.state.read().await;
        let tagged: Vec<&StudySession> = state
            .progress
            .study_sessions
            .iter()
            .filter(|session| session.activities_completed.iter().any(|tag| tag == &key))
            .collect();
        UnitProgress {
            subject: subject.to_string(),
            unit: unit.to_string(),
            completed: state
                .progress
                .units_completed
                .iter()
                .any(|existing| existing == &key),
            total_score: tagged.iter().map(|session| session.total_score).sum(),
            sessions: tagged.len() as i64,
        }
    }

    /// Aggregate statistics over all recorded activity.
    pub async fn get_study_statistics(&self) -> StudyStatistics {
        let state = self.state.read().await;
        let progress = &state.progress;
        let ended: Vec<i64> = progress
            .study_sessions
            .iter()
            .filter(|session| session.end_time.is_some() && session.duration > 0)
            .map(|session| session.duration)
            .collect();
        let average_session_duration = if ended.is_empty() {
            0.0
        } else {
            ended.iter().sum::<i64>() as f64 / ended.len() as f64
        };
        StudyStatistics {
            total_sessions: progress.study_sessions.len() as i64,
            total_study_time: progress.total_study_time,
            average_session_duration,
            total_score: progress.total_score,
            current_streak: progress.current_streak,
            words_learned: progress.words_learned,
            words_mastered: progress.words_mastered() as i64,
            units_completed: progress.units_completed.len() as i64,
            last_study_date: progress.last_study_date,
        }
    }

    /// Words whose overall mastery lies in the inclusive range, strongest
    /// first.
    pub async fn get_words_by_mastery_level(&self, min: u8, max: u8) -> Vec<WordKnowledge> {
        let state = self.state.read().await;
        let mut words: Vec<WordKnowledge> = state
            .progress
            .word_progress
            .values()
            .filter(|knowledge| knowledge.overall_mastery >= min && knowledge.overall_mastery <= max)
            .cloned()
            .collect();
        words.sort_by(|a, b| {
            b.overall_mastery
                .cmp(&a.overall_mastery)
                .then_with(|| a.word_id.cmp(&b.word_id))
        });
        words
    }

    /// Words currently flagged for review, weakest first.
    pub async fn get_words_needing_review(&self) -> Vec<WordKnowledge> {
        let state = self.state.read().await;
        let mut words: Vec<WordKnowledge> = state
            .progress
            .word_progress
            .values()
            .filter(|knowledge| knowledge.needs_review)
            .cloned()
            .collect();
        words.sort_by(|a, b| {
            a.overall_mastery
                .cmp(&b.overall_mastery)
                .then_with(|| a.word_id.cmp(&b.word_id))
        });
        words
    }
}

/// Composite unit key: `subject:unit` when a subject is given, the bare
/// unit name otherwise.
fn unit_key(subject: Option<&str>, unit: &str) -> String {
    match subject {
        Some(subject) => format!("{subject}:{unit}"),
        None => unit.to_string(),
    }
}
