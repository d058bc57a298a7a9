//! Durable stores.

use async_trait::async_trait;
use coursewright_core::{CheckpointKey, CourseGenerationRecord, GenerationCheckpoint};
use coursewright_error::StorageError;
use std::fmt;

/// Exclusive claim on a checkpoint key.
///
/// The claim ends when the value is dropped, so a run that is cancelled,
/// panics or dies with its process never leaves the key blocked.
pub trait CheckpointLease: Send + Sync + fmt::Debug {
    /// Key this lease covers.
    fn key(&self) -> &CheckpointKey;
}

/// Key-value store for generation checkpoints.
///
/// The host application calls [`RecoveryStore::initialize`] once before
/// handing the store to the orchestrator; stores never initialize
/// themselves.
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Prepare the backend. Idempotent.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Durably write a checkpoint under its key, replacing any previous one.
    async fn save(&self, checkpoint: &GenerationCheckpoint) -> Result<(), StorageError>;

    /// Read a checkpoint, `None` if absent.
    async fn load(&self, key: &CheckpointKey) -> Result<Option<GenerationCheckpoint>, StorageError>;

    /// Remove a checkpoint. Removing a missing key is not an error.
    async fn delete(&self, key: &CheckpointKey) -> Result<(), StorageError>;

    /// Keys of every stored checkpoint.
    async fn list_keys(&self) -> Result<Vec<CheckpointKey>, StorageError>;

    /// Claim exclusive use of `key`. Returns `None` if a live run holds it.
    ///
    /// Dropping the returned lease releases the claim.
    async fn acquire_lease(
        &self,
        key: &CheckpointKey,
    ) -> Result<Option<Box<dyn CheckpointLease>>, StorageError>;
}

/// Store for the final record of completed generations.
#[async_trait]
pub trait CourseRecordStore: Send + Sync {
    /// Write a record, replacing an earlier record for the same course.
    async fn save_record(&self, record: &CourseGenerationRecord) -> Result<(), StorageError>;

    /// Read the record for a course.
    async fn load_record(
        &self,
        course_id: &str,
    ) -> Result<Option<CourseGenerationRecord>, StorageError>;
}
