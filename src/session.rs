//! Study session lifecycle.
//!
//! A tracker owns at most one open session per learner scope. Starting
//! while one is open, or ending when none is, fails with [`SessionError`]
//! instead of silently replacing state.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::StudySession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a study session is already open")]
    AlreadyOpen,
    #[error("no study session is open")]
    NotOpen,
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    user_id: Option<String>,
    open: Option<StudySession>,
}

impl SessionTracker {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            open: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open a new session. Fails when one is already open.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<StudySession, SessionError> {
        if self.open.is_some() {
            return Err(SessionError::AlreadyOpen);
        }
        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            start_time: now,
            end_time: None,
            duration: 0,
            words_studied: Vec::new(),
            total_score: 0,
            activities_completed: Vec::new(),
            user_id: self.user_id.clone(),
        };
        self.open = Some(session.clone());
        Ok(session)
    }

    /// Record that a word was studied in the open session. Both the word id
    /// and the activity tag are kept with set semantics.
    pub fn touch(&mut self, word_id: &str, activity_tag: &str) -> Result<(), SessionError> {
        let session = self.open.as_mut().ok_or(SessionError::NotOpen)?;
        if !session.words_studied.iter().any(|word| word == word_id) {
            session.words_studied.push(word_id.to_string());
        }
        if !session
            .activities_completed
            .iter()
            .any(|tag| tag == activity_tag)
        {
            session.activities_completed.push(activity_tag.to_string());
        }
        Ok(())
    }

    /// Close the open session, fixing its end time and whole-second
    /// duration.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<StudySession, SessionError> {
        let mut session = self.open.take().ok_or(SessionError::NotOpen)?;
        session.end_time = Some(now);
        // Clock adjustments can put `now` before the start; a session never
        // has negative duration.
        session.duration = (now - session.start_time).num_seconds().max(0);
        Ok(session)
    }

    /// Drop any open session without finalizing it. Used by a full reset.
    pub fn clear(&mut self) {
        self.open = None;
    }
}
