//! Remote persistence client.
//!
//! The remote target is a keyed record store addressed by learner id. The
//! wire records use snake_case field names, the store's native shape; the
//! in-memory models stay camelCase and the conversion lives here as an
//! adapter detail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::achievements;
use crate::config::RemoteConfig;
use crate::models::{Achievement, UserProgress};

use super::{ProgressSnapshot, StoreError, StoreResult, SCHEMA_VERSION};

/// Keyed remote record store: read and upsert one snapshot per learner.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<ProgressSnapshot>>;
    async fn upsert(&self, user_id: &str, snapshot: &ProgressSnapshot) -> StoreResult<()>;
}

// ========== Wire records ==========

/// Progress record as the remote store holds it. The nested word and
/// session collections travel as opaque JSON blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProgressRecord {
    pub user_id: String,
    pub total_score: i64,
    pub current_streak: u32,
    pub units_completed: Vec<String>,
    pub words_learned: u32,
    pub last_study_date: Option<DateTime<Utc>>,
    pub word_progress: serde_json::Value,
    pub study_sessions: serde_json::Value,
    pub total_study_time: i64,
}

/// Per-achievement flag record. The rule table owns titles and icons; only
/// the flags travel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAchievementRecord {
    pub achievement_id: String,
    pub achieved: bool,
    pub achieved_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSnapshotPayload {
    pub schema_version: u32,
    pub progress: RemoteProgressRecord,
    pub achievements: Vec<RemoteAchievementRecord>,
}

impl RemoteSnapshotPayload {
    pub fn from_snapshot(user_id: &str, snapshot: &ProgressSnapshot) -> StoreResult<Self> {
        let word_progress = serde_json::to_value(&snapshot.progress.word_progress)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let study_sessions = serde_json::to_value(&snapshot.progress.study_sessions)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            progress: RemoteProgressRecord {
                user_id: user_id.to_string(),
                total_score: snapshot.progress.total_score,
                current_streak: snapshot.progress.current_streak,
                units_completed: snapshot.progress.units_completed.clone(),
                words_learned: snapshot.progress.words_learned,
                last_study_date: snapshot.progress.last_study_date,
                word_progress,
                study_sessions,
                total_study_time: snapshot.progress.total_study_time,
            },
            achievements: snapshot
                .achievements
                .iter()
                .map(|achievement| RemoteAchievementRecord {
                    achievement_id: achievement.id.clone(),
                    achieved: achievement.achieved,
                    achieved_date: achievement.achieved_date,
                })
                .collect(),
        })
    }

    pub fn into_snapshot(self) -> StoreResult<ProgressSnapshot> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(StoreError::Malformed(format!(
                "unknown snapshot schema version {}",
                self.schema_version
            )));
        }
        let word_progress = serde_json::from_value(self.progress.word_progress)
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        let study_sessions = serde_json::from_value(self.progress.study_sessions)
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        let progress = UserProgress {
            user_id: Some(self.progress.user_id),
            total_score: self.progress.total_score,
            current_streak: self.progress.current_streak,
            units_completed: self.progress.units_completed,
            words_learned: self.progress.words_learned,
            last_study_date: self.progress.last_study_date,
            word_progress,
            study_sessions,
            total_study_time: self.progress.total_study_time,
        };
        Ok(ProgressSnapshot {
            progress,
            achievements: apply_achievement_flags(self.achievements),
        })
    }
}

/// Rebuild the achievement list from the rule table and the persisted
/// flags. Unknown ids are dropped; missing ones stay locked.
fn apply_achievement_flags(records: Vec<RemoteAchievementRecord>) -> Vec<Achievement> {
    let mut achievements = achievements::default_achievements();
    for record in records {
        if let Some(achievement) = achievements
            .iter_mut()
            .find(|achievement| achievement.id == record.achievement_id)
        {
            achievement.achieved = record.achieved;
            achievement.achieved_date = record.achieved_date;
        }
    }
    achievements
}

// ========== HTTP client ==========

/// HTTP implementation backed by the platform's record-store API.
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| StoreError::Remote(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn progress_url(&self, user_id: &str) -> String {
        format!("{}/api/progress/{}", self.base_url, user_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<ProgressSnapshot>> {
        let response = self
            .authorize(self.client.get(self.progress_url(user_id)))
            .send()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Remote(format!(
                "fetch failed: HTTP {}",
                response.status()
            )));
        }

        let payload = response
            .json::<RemoteSnapshotPayload>()
            .await
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        payload.into_snapshot().map(Some)
    }

    async fn upsert(&self, user_id: &str, snapshot: &ProgressSnapshot) -> StoreResult<()> {
        let payload = RemoteSnapshotPayload::from_snapshot(user_id, snapshot)?;
        let response = self
            .authorize(self.client.put(self.progress_url(user_id)))
            .json(&payload)
            .send()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Remote(format!(
                "upsert failed: HTTP {}",
                response.status()
            )))
        }
    }
}

// ========== In-memory test double ==========

/// In-memory remote store used by tests and offline development. The
/// failure switch simulates an unreachable remote.
#[derive(Default)]
pub struct MemoryRemoteStore {
    records: RwLock<HashMap<String, ProgressSnapshot>>,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Remote("simulated network failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<ProgressSnapshot>> {
        self.check_available()?;
        Ok(self.records.read().get(user_id).cloned())
    }

    async fn upsert(&self, user_id: &str, snapshot: &ProgressSnapshot) -> StoreResult<()> {
        self.check_available()?;
        self.records
            .write()
            .insert(user_id.to_string(), snapshot.clone());
        Ok(())
    }
}
