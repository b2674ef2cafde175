//! Durable skip tracking.
//!
//! The skip-list is the sequencer's memory of every lead completed or
//! skipped in a session, persisted per list id so a client restart never
//! re-dials a handled lead. Stores hold a superset of what the session has
//! handled; adding the same lead twice is a no-op.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;

use dialwave_relay_core::{LeadId, ListId};

use crate::error::{DialerError, DialerResult};

/// Durable storage for per-list skip sets.
#[async_trait]
pub trait SkipStore: Send + Sync {
    /// Load the persisted skip set for a list. Missing state is an empty set.
    async fn load(&self, list_id: &ListId) -> DialerResult<HashSet<LeadId>>;

    /// Persist the full skip set for a list, replacing any prior state.
    async fn save(&self, list_id: &ListId, skip: &HashSet<LeadId>) -> DialerResult<()>;

    /// Drop the persisted state for a list (used when the queue is exhausted).
    async fn clear(&self, list_id: &ListId) -> DialerResult<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySkipStore {
    sets: DashMap<ListId, HashSet<LeadId>>,
}

impl MemorySkipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkipStore for MemorySkipStore {
    async fn load(&self, list_id: &ListId) -> DialerResult<HashSet<LeadId>> {
        Ok(self.sets.get(list_id).map(|s| s.clone()).unwrap_or_default())
    }

    async fn save(&self, list_id: &ListId, skip: &HashSet<LeadId>) -> DialerResult<()> {
        self.sets.insert(list_id.clone(), skip.clone());
        Ok(())
    }

    async fn clear(&self, list_id: &ListId) -> DialerResult<()> {
        self.sets.remove(list_id);
        Ok(())
    }
}

/// File-backed store: one JSON document per list under a state directory.
#[derive(Debug, Clone)]
pub struct JsonFileSkipStore {
    dir: PathBuf,
}

impl JsonFileSkipStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, list_id: &ListId) -> PathBuf {
        // List ids come from an external system; keep the file name tame.
        let safe: String = list_id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("skip-{}.json", safe))
    }
}

#[async_trait]
impl SkipStore for JsonFileSkipStore {
    async fn load(&self, list_id: &ListId) -> DialerResult<HashSet<LeadId>> {
        let path = self.path_for(list_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let ids: Vec<LeadId> = serde_json::from_slice(&bytes).map_err(|e| {
                    DialerError::skip_store(format!("corrupt skip file {}: {}", path.display(), e))
                })?;
                Ok(ids.into_iter().collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(DialerError::skip_store(format!(
                "read {} failed: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, list_id: &ListId, skip: &HashSet<LeadId>) -> DialerResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DialerError::skip_store(format!("create state dir failed: {}", e)))?;
        // Stable ordering keeps the files diffable.
        let mut ids: Vec<&LeadId> = skip.iter().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let bytes = serde_json::to_vec_pretty(&ids)
            .map_err(|e| DialerError::skip_store(format!("encode skip set failed: {}", e)))?;
        let path = self.path_for(list_id);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DialerError::skip_store(format!("write {} failed: {}", path.display(), e)))
    }

    async fn clear(&self, list_id: &ListId) -> DialerResult<()> {
        let path = self.path_for(list_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DialerError::skip_store(format!(
                "remove {} failed: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<LeadId> {
        ids.iter().map(|s| LeadId::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySkipStore::new();
        let list = ListId::new("morning-leads");
        assert!(store.load(&list).await.unwrap().is_empty());

        store.save(&list, &set(&["a", "b"])).await.unwrap();
        assert_eq!(store.load(&list).await.unwrap(), set(&["a", "b"]));

        store.clear(&list).await.unwrap();
        assert!(store.load(&list).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("dialwave-skip-{}", uuid::Uuid::new_v4()));
        let list = ListId::new("Morning Leads");

        let store = JsonFileSkipStore::new(&dir);
        store.save(&list, &set(&["a"])).await.unwrap();

        // A fresh store over the same directory sees the same state, the
        // way a restarted client would.
        let reopened = JsonFileSkipStore::new(&dir);
        assert_eq!(reopened.load(&list).await.unwrap(), set(&["a"]));

        reopened.clear(&list).await.unwrap();
        assert!(reopened.load(&list).await.unwrap().is_empty());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_set() {
        let dir = std::env::temp_dir().join(format!("dialwave-skip-{}", uuid::Uuid::new_v4()));
        let store = JsonFileSkipStore::new(&dir);
        assert!(store.load(&ListId::new("never-saved")).await.unwrap().is_empty());
    }
}
