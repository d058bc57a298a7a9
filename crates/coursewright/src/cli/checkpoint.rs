//! Checkpoint management command handler.

use super::CheckpointCommands;
use coursewright::{
    CheckpointKey, ClearOutcome, CoursewrightConfig, CoursewrightResult, JsonError, LeaseState,
    RecoveryStore,
};
use std::process::ExitCode;
use tracing::{info, warn};

/// Run a `coursewright checkpoint` subcommand.
pub async fn handle_checkpoint_command(
    config: &CoursewrightConfig,
    command: CheckpointCommands,
) -> CoursewrightResult<ExitCode> {
    let store = super::open_store(config).await?;

    match command {
        CheckpointCommands::List => {
            let keys = store.list_keys().await?;
            if keys.is_empty() {
                println!("No saved checkpoints.");
            }
            for key in keys {
                let running = match store.lease_state(&key).await {
                    Ok(LeaseState::Held(_)) => "\trunning",
                    Ok(LeaseState::Free) => "",
                    Err(e) => {
                        warn!(key = %key, error = %e, "Could not read lease");
                        ""
                    }
                };
                match store.load(&key).await {
                    Ok(Some(cp)) => println!(
                        "{}\t{:>5.1}%\t{}/{} tasks\t{}{}{}",
                        key,
                        cp.progress_percent,
                        cp.completed_task_count,
                        cp.total_tasks,
                        cp.timestamp.to_rfc3339(),
                        running,
                        cp.last_error
                            .as_deref()
                            .map(|e| format!("\tlast error: {}", e))
                            .unwrap_or_default()
                    ),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(key = %key, error = %e, "Could not read checkpoint");
                        println!("{}\t(unreadable)", key);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        CheckpointCommands::Show { key } => {
            match store.load(&CheckpointKey::new(key.as_str())).await? {
                Some(cp) => {
                    let text = serde_json::to_string_pretty(&cp).map_err(|e| {
                        JsonError::new(format!("checkpoint '{}'", key), e.to_string())
                    })?;
                    println!("{}", text);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("No checkpoint named '{}'.", key);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        CheckpointCommands::Clear { key } => {
            match store.clear(&CheckpointKey::new(key.as_str())).await? {
                ClearOutcome::Cleared => {
                    info!(key = %key, "Checkpoint cleared");
                    println!("Cleared checkpoint '{}'.", key);
                    Ok(ExitCode::SUCCESS)
                }
                ClearOutcome::Running(holder) => {
                    match holder {
                        Some(h) => eprintln!(
                            "Checkpoint '{}' belongs to a run that is still generating (pid {}, since {}).",
                            key,
                            h.pid,
                            h.acquired_at.to_rfc3339()
                        ),
                        None => eprintln!(
                            "Checkpoint '{}' belongs to a run that is still generating.",
                            key
                        ),
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
