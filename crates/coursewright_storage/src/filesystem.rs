//! Filesystem-backed store.
//!
//! Layout under the base directory:
//!
//! ```text
//! {base}/
//! ├── checkpoints/   {key}.json
//! ├── leases/        {key}.lock
//! └── records/       record-{course}.json
//! ```
//!
//! Every write goes to a uniquely named temp file in the target directory
//! and is renamed into place, so readers see either the old or the new
//! document and never a torn one.
//!
//! A lease is an exclusive OS lock on `leases/{key}.lock`. The operating
//! system drops the lock when the holder's file handle closes, which covers
//! a crashed or killed process as well as a dropped lease. The file itself
//! stays behind and only records who held it last.

use crate::key::{record_stem, validate_key};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursewright_core::{CheckpointKey, CourseGenerationRecord, GenerationCheckpoint};
use coursewright_error::{StorageError, StorageErrorKind};
use coursewright_interface::{CheckpointLease, CourseRecordStore, RecoveryStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

const CHECKPOINTS: &str = "checkpoints";
const LEASES: &str = "leases";
const RECORDS: &str = "records";

/// Process holding a lease, as written into the lease file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseHolder {
    /// Process id of the holder
    pub pid: u32,
    /// When the lease was taken
    pub acquired_at: DateTime<Utc>,
}

impl LeaseHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// Whether a key's lease is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseState {
    /// No live run holds the key
    Free,
    /// A live run holds the key; `None` when the holder has not recorded itself yet
    Held(Option<LeaseHolder>),
}

/// Result of [`FileSystemRecoveryStore::clear`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The checkpoint is gone, or there was none
    Cleared,
    /// A live run holds the key; the checkpoint was left alone
    Running(Option<LeaseHolder>),
}

/// Lease backed by a locked file handle.
#[derive(Debug)]
struct FileLease {
    key: CheckpointKey,
    file: File,
}

impl CheckpointLease for FileLease {
    fn key(&self) -> &CheckpointKey {
        &self.key
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well.
        if let Err(e) = self.file.unlock() {
            warn!(key = %self.key, error = %e, "Could not unlock lease file");
        }
        debug!(key = %self.key, "Lease released");
    }
}

fn lease_error(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::new(StorageErrorKind::FileWrite(format!(
        "{}: {}",
        path.display(),
        e
    )))
}

fn join_error(e: tokio::task::JoinError) -> StorageError {
    StorageError::new(StorageErrorKind::Unavailable(format!(
        "lease task failed: {}",
        e
    )))
}

/// Open the lease file and take its lock without waiting. `None` when
/// another handle holds the lock.
fn lock_lease_file(path: &Path, holder: &LeaseHolder) -> Result<Option<File>, StorageError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| lease_error(path, e))?;
    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => return Ok(None),
        Err(TryLockError::Error(e)) => return Err(lease_error(path, e)),
    }
    let bytes = serde_json::to_vec(holder).map_err(|e| lease_error(path, e))?;
    file.set_len(0).map_err(|e| lease_error(path, e))?;
    file.write_all(&bytes).map_err(|e| lease_error(path, e))?;
    file.flush().map_err(|e| lease_error(path, e))?;
    Ok(Some(file))
}

fn inspect_lease_file(path: &Path) -> Result<LeaseState, StorageError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LeaseState::Free),
        Err(e) => return Err(lease_error(path, e)),
    };
    match file.try_lock_shared() {
        Ok(()) => Ok(LeaseState::Free),
        Err(TryLockError::WouldBlock) => {
            let mut text = String::new();
            file.read_to_string(&mut text)
                .map_err(|e| lease_error(path, e))?;
            Ok(LeaseState::Held(serde_json::from_str(&text).ok()))
        }
        Err(TryLockError::Error(e)) => Err(lease_error(path, e)),
    }
}

/// JSON-file store rooted at a directory.
///
/// Call [`RecoveryStore::initialize`] before use; writes before that fail
/// with [`StorageErrorKind::NotInitialized`].
#[derive(Debug)]
pub struct FileSystemRecoveryStore {
    base_path: PathBuf,
    initialized: AtomicBool,
}

impl FileSystemRecoveryStore {
    /// Store rooted at `base_path`. Nothing is touched on disk until
    /// [`RecoveryStore::initialize`].
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Root directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_initialized(&self) -> Result<(), StorageError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::new(StorageErrorKind::NotInitialized(
                self.base_path.display().to_string(),
            )))
        }
    }

    fn checkpoint_path(&self, key: &str) -> PathBuf {
        self.base_path.join(CHECKPOINTS).join(format!("{}.json", key))
    }

    fn lease_path(&self, key: &str) -> PathBuf {
        self.base_path.join(LEASES).join(format!("{}.lock", key))
    }

    fn record_path(&self, stem: &str) -> PathBuf {
        self.base_path.join(RECORDS).join(format!("{}.json", stem))
    }

    /// Whether a live run holds the lease on `key`, and which process.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn lease_state(&self, key: &CheckpointKey) -> Result<LeaseState, StorageError> {
        self.ensure_initialized()?;
        validate_key(key.as_str())?;
        let path = self.lease_path(key.as_str());
        tokio::task::spawn_blocking(move || inspect_lease_file(&path))
            .await
            .map_err(join_error)?
    }

    /// Delete the checkpoint for `key` unless a live run holds its lease.
    ///
    /// The lease is held across the delete, so a run cannot start halfway
    /// through it.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn clear(&self, key: &CheckpointKey) -> Result<ClearOutcome, StorageError> {
        let Some(lease) = self.acquire_lease(key).await? else {
            return Ok(match self.lease_state(key).await? {
                LeaseState::Held(holder) => ClearOutcome::Running(holder),
                LeaseState::Free => ClearOutcome::Running(None),
            });
        };
        self.delete(key).await?;
        drop(lease);
        info!("Checkpoint cleared");
        Ok(ClearOutcome::Cleared)
    }

    async fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))));
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            StorageError::new(StorageErrorKind::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
    }

    async fn remove_if_present(&self, path: &Path) -> Result<(), StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileDelete(format!(
                "{}: {}",
                path.display(),
                e
            )))),
        }
    }
}

#[async_trait]
impl RecoveryStore for FileSystemRecoveryStore {
    #[instrument(skip(self), fields(path = %self.base_path.display()))]
    async fn initialize(&self) -> Result<(), StorageError> {
        for dir in [CHECKPOINTS, LEASES, RECORDS] {
            let path = self.base_path.join(dir);
            tokio::fs::create_dir_all(&path).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;
        }
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!("Initialized checkpoint store");
        }
        Ok(())
    }

    #[instrument(skip(self, checkpoint), fields(key = %checkpoint.key, progress = checkpoint.progress_percent))]
    async fn save(&self, checkpoint: &GenerationCheckpoint) -> Result<(), StorageError> {
        self.ensure_initialized()?;
        validate_key(checkpoint.key.as_str())?;
        let path = self.checkpoint_path(checkpoint.key.as_str());
        self.write_atomic(&path, checkpoint).await?;
        debug!(path = %path.display(), "Saved checkpoint");
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn load(&self, key: &CheckpointKey) -> Result<Option<GenerationCheckpoint>, StorageError> {
        self.ensure_initialized()?;
        validate_key(key.as_str())?;
        self.read_json(&self.checkpoint_path(key.as_str()), key.as_str())
            .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &CheckpointKey) -> Result<(), StorageError> {
        self.ensure_initialized()?;
        validate_key(key.as_str())?;
        self.remove_if_present(&self.checkpoint_path(key.as_str()))
            .await?;
        debug!("Deleted checkpoint");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<CheckpointKey>, StorageError> {
        self.ensure_initialized()?;
        let dir = self.base_path.join(CHECKPOINTS);
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;

        let mut keys = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            // Temp files carry an extra extension and never match here.
            if validate_key(stem).is_ok() {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys.into_iter().map(CheckpointKey::new).collect())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn acquire_lease(
        &self,
        key: &CheckpointKey,
    ) -> Result<Option<Box<dyn CheckpointLease>>, StorageError> {
        self.ensure_initialized()?;
        validate_key(key.as_str())?;
        let path = self.lease_path(key.as_str());
        let lock_path = path.clone();
        let locked = tokio::task::spawn_blocking(move || {
            lock_lease_file(&lock_path, &LeaseHolder::current())
        })
        .await
        .map_err(join_error)??;

        match locked {
            Some(file) => {
                debug!("Lease acquired");
                Ok(Some(Box::new(FileLease {
                    key: key.clone(),
                    file,
                })))
            }
            None => {
                warn!(path = %path.display(), "Lease held by a live run");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CourseRecordStore for FileSystemRecoveryStore {
    #[instrument(skip(self, record), fields(course = %record.course_id))]
    async fn save_record(&self, record: &CourseGenerationRecord) -> Result<(), StorageError> {
        self.ensure_initialized()?;
        let stem = if record.course_id.trim().is_empty() {
            record.checkpoint_key.as_str().to_string()
        } else {
            record_stem(&record.course_id)
        };
        validate_key(&stem)?;
        self.write_atomic(&self.record_path(&stem), record).await?;
        info!(
            total_tokens = *record.token_usage.total_tokens(),
            "Saved course record"
        );
        Ok(())
    }

    async fn load_record(
        &self,
        course_id: &str,
    ) -> Result<Option<CourseGenerationRecord>, StorageError> {
        self.ensure_initialized()?;
        let stem = record_stem(course_id);
        validate_key(&stem)?;
        self.read_json(&self.record_path(&stem), &stem).await
    }
}
