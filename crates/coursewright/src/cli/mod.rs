//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the coursewright binary.

mod checkpoint;
mod commands;
mod generate;

pub use checkpoint::handle_checkpoint_command;
pub use commands::{CheckpointCommands, Cli, Commands, GenerateArgs};
pub use generate::run_generate;

use coursewright::{CoursewrightConfig, FileSystemRecoveryStore, RecoveryStore};
use std::sync::Arc;
use tracing::debug;

/// Open and initialize the checkpoint store named by the configuration.
async fn open_store(
    config: &CoursewrightConfig,
) -> Result<Arc<FileSystemRecoveryStore>, coursewright::StorageError> {
    let path = config.storage().resolved_path();
    debug!(path = %path.display(), "Opening checkpoint store");
    let store = Arc::new(FileSystemRecoveryStore::new(path));
    store.initialize().await?;
    Ok(store)
}
