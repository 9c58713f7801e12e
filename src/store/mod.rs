//! Dual-target persistence for progress snapshots.
//!
//! Saves go remote-first when a learner id is known and fall back to the
//! on-device store on any remote failure; loads mirror that order and fall
//! through to fresh defaults. No failure here is fatal: the in-memory state
//! stays authoritative and at worst the latest increment is lost on the
//! next load.

pub mod local;
pub mod remote;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::achievements;
use crate::config::ProgressConfig;
use crate::models::{Achievement, UserProgress};

pub use local::LocalStore;
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};

/// Version stamped into persisted snapshots. Records with a newer version
/// than this are treated as malformed and discarded.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote store unavailable: {0}")]
    Remote(String),
    #[error("malformed persisted record: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ========== Scope ==========

/// Identifies whose progress a store operation concerns: a known learner
/// or the single anonymous profile of this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    user_id: Option<String>,
}

impl Scope {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn storage_key(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }

    fn progress_key(&self) -> String {
        format!("{}:progress", self.storage_key())
    }

    fn achievements_key(&self) -> String {
        format!("{}:achievements", self.storage_key())
    }
}

// ========== Snapshot ==========

/// Everything the engine persists for one learner scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress: UserProgress,
    pub achievements: Vec<Achievement>,
}

impl ProgressSnapshot {
    /// Fresh defaults for a scope with no persisted record.
    pub fn initial(scope: &Scope) -> Self {
        Self {
            progress: UserProgress::new(scope.user_id().map(str::to_string)),
            achievements: achievements::default_achievements(),
        }
    }
}

/// Envelope for the progress blob in the on-device store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionedProgress {
    schema_version: u32,
    progress: UserProgress,
}

// ========== Dual-target store ==========

pub struct ProgressStore {
    remote: Option<Arc<dyn RemoteStore>>,
    local: LocalStore,
}

impl ProgressStore {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    /// Build the store from configuration: an HTTP remote when an API URL
    /// is configured, plus the on-device file store.
    pub fn from_config(config: &ProgressConfig) -> StoreResult<Self> {
        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote {
            Some(remote_config) => Some(Arc::new(HttpRemoteStore::new(remote_config)?)),
            None => None,
        };
        let local = LocalStore::open(config.data_dir.join("progress-store.json"))?;
        Ok(Self { remote, local })
    }

    /// Durably write the snapshot. Remote-first when the scope has a
    /// learner id; any remote failure falls back to the on-device store.
    pub async fn save(&self, scope: &Scope, snapshot: &ProgressSnapshot) -> StoreResult<()> {
        if let (Some(user_id), Some(remote)) = (scope.user_id(), self.remote.as_ref()) {
            match remote.upsert(user_id, snapshot).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        user_id,
                        "remote save failed, falling back to local store"
                    );
                }
            }
        }
        self.save_local(scope, snapshot)
    }

    /// Write the snapshot to every configured target. Used by progress
    /// resets, which must clear both stores. A remote failure is logged
    /// and does not fail the local write.
    pub async fn save_to_all_targets(
        &self,
        scope: &Scope,
        snapshot: &ProgressSnapshot,
    ) -> StoreResult<()> {
        if let (Some(user_id), Some(remote)) = (scope.user_id(), self.remote.as_ref()) {
            if let Err(err) = remote.upsert(user_id, snapshot).await {
                tracing::warn!(error = %err, user_id, "remote save failed during reset");
            }
        }
        self.save_local(scope, snapshot)
    }

    fn save_local(&self, scope: &Scope, snapshot: &ProgressSnapshot) -> StoreResult<()> {
        let progress = serde_json::to_string(&VersionedProgress {
            schema_version: SCHEMA_VERSION,
            progress: snapshot.progress.clone(),
        })
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let achievements = serde_json::to_string(&snapshot.achievements)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.local.set(&scope.progress_key(), progress)?;
        self.local.set(&scope.achievements_key(), achievements)?;
        Ok(())
    }

    /// Load the snapshot for a scope: remote first, then the on-device
    /// store, then fresh defaults. Never fails; unreadable records are
    /// discarded. When defaults are handed out for a known learner, the
    /// initial snapshot is persisted eagerly so a record exists from then
    /// on.
    pub async fn load(&self, scope: &Scope) -> ProgressSnapshot {
        if let (Some(user_id), Some(remote)) = (scope.user_id(), self.remote.as_ref()) {
            match remote.fetch(user_id).await {
                Ok(Some(snapshot)) => return snapshot,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, user_id, "remote load failed, trying local store");
                }
            }
        }

        if let Some(snapshot) = self.load_local(scope) {
            return snapshot;
        }

        let initial = ProgressSnapshot::initial(scope);
        if scope.user_id().is_some() {
            if let Err(err) = self.save(scope, &initial).await {
                tracing::warn!(error = %err, "failed to persist initial snapshot");
            }
        }
        initial
    }

    fn load_local(&self, scope: &Scope) -> Option<ProgressSnapshot> {
        let raw = self.local.get(&scope.progress_key())?;
        let progress = match serde_json::from_str::<VersionedProgress>(&raw) {
            Ok(versioned) if versioned.schema_version <= SCHEMA_VERSION => versioned.progress,
            Ok(versioned) => {
                tracing::warn!(
                    schema_version = versioned.schema_version,
                    "discarding snapshot with unknown schema version"
                );
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed local progress record");
                return None;
            }
        };

        let achievements = match self.local.get(&scope.achievements_key()) {
            Some(raw) => match serde_json::from_str::<Vec<Achievement>>(&raw) {
                Ok(list) => merge_achievement_list(list),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed local achievement record");
                    achievements::default_achievements()
                }
            },
            None => achievements::default_achievements(),
        };

        Some(ProgressSnapshot {
            progress,
            achievements,
        })
    }
}

/// Overlay persisted flags onto the current rule table so added or renamed
/// achievements pick up defaults while earned flags survive.
fn merge_achievement_list(persisted: Vec<Achievement>) -> Vec<Achievement> {
    let mut achievements = achievements::default_achievements();
    for saved in persisted {
        if let Some(achievement) = achievements
            .iter_mut()
            .find(|achievement| achievement.id == saved.id)
        {
            achievement.achieved = saved.achieved;
            achievement.achieved_date = saved.achieved_date;
        }
    }
    achievements
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(remote: Option<Arc<dyn RemoteStore>>) -> (ProgressStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path().join("store.json")).unwrap();
        (ProgressStore::new(remote, local), dir)
    }

    fn snapshot_with_score(scope: &Scope, score: i64) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot::initial(scope);
        snapshot.progress.total_score = score;
        snapshot
    }

    #[test]
    fn scope_keys_fall_back_to_anonymous() {
        let anonymous = Scope::anonymous();
        assert_eq!(anonymous.progress_key(), "anonymous:progress");
        assert_eq!(anonymous.achievements_key(), "anonymous:achievements");

        let user = Scope::for_user("user-1");
        assert_eq!(user.progress_key(), "user-1:progress");
        assert_eq!(user.user_id(), Some("user-1"));
    }

    #[tokio::test]
    async fn anonymous_save_stays_local_even_with_a_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let (store, _dir) = store_with(Some(remote.clone() as Arc<dyn RemoteStore>));
        let scope = Scope::anonymous();
        let snapshot = snapshot_with_score(&scope, 42);

        store.save(&scope, &snapshot).await.unwrap();
        assert_eq!(remote.record_count(), 0, "no learner id, no remote record");
        assert_eq!(store.load(&scope).await, snapshot);
    }

    #[tokio::test]
    async fn remote_save_skips_the_local_store() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let (store, _dir) = store_with(Some(remote.clone() as Arc<dyn RemoteStore>));
        let scope = Scope::for_user("user-1");
        let snapshot = snapshot_with_score(&scope, 42);

        store.save(&scope, &snapshot).await.unwrap();
        assert_eq!(remote.record_count(), 1);
        assert!(
            store.local.get(&scope.progress_key()).is_none(),
            "a successful remote save leaves the local store untouched"
        );
    }

    #[tokio::test]
    async fn failed_remote_save_falls_back_to_local() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_failing(true);
        let (store, _dir) = store_with(Some(remote.clone() as Arc<dyn RemoteStore>));
        let scope = Scope::for_user("user-1");
        let snapshot = snapshot_with_score(&scope, 42);

        store.save(&scope, &snapshot).await.unwrap();
        assert_eq!(remote.record_count(), 0);
        assert_eq!(store.load(&scope).await, snapshot, "served from the fallback");
    }

    #[tokio::test]
    async fn load_prefers_remote_over_local() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let (store, _dir) = store_with(Some(remote.clone() as Arc<dyn RemoteStore>));
        let scope = Scope::for_user("user-1");

        store
            .save_local(&scope, &snapshot_with_score(&scope, 1))
            .unwrap();
        remote
            .upsert("user-1", &snapshot_with_score(&scope, 2))
            .await
            .unwrap();

        let loaded = store.load(&scope).await;
        assert_eq!(loaded.progress.total_score, 2);
    }

    #[tokio::test]
    async fn load_for_new_learner_persists_initial_defaults() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let (store, _dir) = store_with(Some(remote.clone() as Arc<dyn RemoteStore>));
        let scope = Scope::for_user("user-1");

        let loaded = store.load(&scope).await;
        assert_eq!(loaded, ProgressSnapshot::initial(&scope));
        assert_eq!(remote.record_count(), 1, "defaults were persisted eagerly");
    }

    #[tokio::test]
    async fn malformed_local_progress_is_discarded() {
        let (store, _dir) = store_with(None);
        let scope = Scope::anonymous();
        store
            .local
            .set(&scope.progress_key(), "{ not valid json".to_string())
            .unwrap();

        let loaded = store.load(&scope).await;
        assert_eq!(loaded, ProgressSnapshot::initial(&scope));
    }

    #[tokio::test]
    async fn newer_schema_version_is_discarded() {
        let (store, _dir) = store_with(None);
        let scope = Scope::anonymous();
        let snapshot = snapshot_with_score(&scope, 42);
        let blob = serde_json::json!({
            "schemaVersion": SCHEMA_VERSION + 1,
            "progress": snapshot.progress,
        });
        store
            .local
            .set(&scope.progress_key(), blob.to_string())
            .unwrap();

        let loaded = store.load(&scope).await;
        assert_eq!(loaded.progress.total_score, 0, "newer records are not trusted");
    }

    #[tokio::test]
    async fn from_config_builds_a_local_only_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProgressConfig {
            remote: None,
            data_dir: dir.path().to_path_buf(),
            log_level: "info".to_string(),
        };
        let store = ProgressStore::from_config(&config).unwrap();
        let scope = Scope::anonymous();
        let snapshot = snapshot_with_score(&scope, 7);
        store.save(&scope, &snapshot).await.unwrap();
        assert!(dir.path().join("progress-store.json").exists());
    }
}
