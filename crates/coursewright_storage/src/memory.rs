//! In-process store.

use crate::key::{record_stem, validate_key};
use async_trait::async_trait;
use coursewright_core::{CheckpointKey, CourseGenerationRecord, GenerationCheckpoint};
use coursewright_error::{StorageError, StorageErrorKind};
use coursewright_interface::{CheckpointLease, CourseRecordStore, RecoveryStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Default)]
struct Inner {
    checkpoints: HashMap<String, GenerationCheckpoint>,
    leases: HashSet<String>,
    records: HashMap<String, CourseGenerationRecord>,
}

/// Store backed by process memory. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryRecoveryStore {
    inner: Arc<Mutex<Inner>>,
}

/// Lease on an in-memory key; dropping it frees the key.
#[derive(Debug)]
struct MemoryLease {
    key: CheckpointKey,
    inner: Weak<Mutex<Inner>>,
}

impl CheckpointLease for MemoryLease {
    fn key(&self) -> &CheckpointKey {
        &self.key
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .leases
                .remove(self.key.as_str());
        }
    }
}

impl InMemoryRecoveryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner.lock().map_err(|_| {
            StorageError::new(StorageErrorKind::Unavailable(
                "in-memory store lock poisoned".to_string(),
            ))
        })
    }

    /// Number of checkpoints currently held.
    pub fn checkpoint_count(&self) -> usize {
        self.lock().map(|inner| inner.checkpoints.len()).unwrap_or(0)
    }

    /// Whether a lease is held for `key`.
    pub fn is_leased(&self, key: &CheckpointKey) -> bool {
        self.lock()
            .map(|inner| inner.leases.contains(key.as_str()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RecoveryStore for InMemoryRecoveryStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(&self, checkpoint: &GenerationCheckpoint) -> Result<(), StorageError> {
        validate_key(checkpoint.key.as_str())?;
        self.lock()?
            .checkpoints
            .insert(checkpoint.key.as_str().to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, key: &CheckpointKey) -> Result<Option<GenerationCheckpoint>, StorageError> {
        Ok(self.lock()?.checkpoints.get(key.as_str()).cloned())
    }

    async fn delete(&self, key: &CheckpointKey) -> Result<(), StorageError> {
        self.lock()?.checkpoints.remove(key.as_str());
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<CheckpointKey>, StorageError> {
        let mut keys: Vec<_> = self.lock()?.checkpoints.keys().cloned().collect();
        keys.sort();
        Ok(keys.into_iter().map(CheckpointKey::new).collect())
    }

    async fn acquire_lease(
        &self,
        key: &CheckpointKey,
    ) -> Result<Option<Box<dyn CheckpointLease>>, StorageError> {
        validate_key(key.as_str())?;
        if !self.lock()?.leases.insert(key.as_str().to_string()) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryLease {
            key: key.clone(),
            inner: Arc::downgrade(&self.inner),
        })))
    }
}

#[async_trait]
impl CourseRecordStore for InMemoryRecoveryStore {
    async fn save_record(&self, record: &CourseGenerationRecord) -> Result<(), StorageError> {
        let stem = if record.course_id.trim().is_empty() {
            record.checkpoint_key.as_str().to_string()
        } else {
            record_stem(&record.course_id)
        };
        self.lock()?.records.insert(stem, record.clone());
        Ok(())
    }

    async fn load_record(
        &self,
        course_id: &str,
    ) -> Result<Option<CourseGenerationRecord>, StorageError> {
        Ok(self.lock()?.records.get(&record_stem(course_id)).cloned())
    }
}
