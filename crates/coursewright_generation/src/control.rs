//! Pause, resume and abort.

use crate::{GenerationError, GenerationErrorKind};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared handle controlling one generation run.
///
/// Clones refer to the same run. Pausing takes effect at the next
/// [`GenerationControl::check_pause_status`], which the orchestrator awaits
/// before every remote call. Aborting cancels the token raced against every
/// in-flight call as well.
#[derive(Debug, Clone)]
pub struct GenerationControl {
    paused: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl Default for GenerationControl {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationControl {
    /// Handle for a run that is neither paused nor aborted.
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused: Arc::new(paused),
            cancel: CancellationToken::new(),
        }
    }

    /// Request a pause at the next step boundary.
    pub fn pause(&self) {
        if !self.paused.send_replace(true) {
            info!("Generation pause requested");
        }
    }

    /// Lift a pause.
    pub fn resume(&self) {
        if self.paused.send_replace(false) {
            info!("Generation resumed");
        }
    }

    /// Abort the run. Also releases a paused run.
    pub fn abort(&self) {
        if !self.cancel.is_cancelled() {
            info!("Generation abort requested");
        }
        self.cancel.cancel();
    }

    /// Whether a pause is in effect.
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Whether abort was requested.
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires on abort.
    pub fn abort_signal(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Return once the run is not paused.
    ///
    /// Suspends on the pause channel without polling.
    ///
    /// # Errors
    ///
    /// [`GenerationErrorKind::Aborted`] if abort was requested before or
    /// while waiting.
    pub async fn check_pause_status(&self) -> Result<(), GenerationError> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::new(GenerationErrorKind::Aborted));
        }
        let mut receiver = self.paused.subscribe();
        if !*receiver.borrow_and_update() {
            return Ok(());
        }
        debug!("Waiting for resume");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GenerationError::new(GenerationErrorKind::Aborted)),
            _ = receiver.wait_for(|paused| !*paused) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn unpaused_returns_immediately() {
        let control = GenerationControl::new();
        control.check_pause_status().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paused_waits_for_resume() {
        let control = GenerationControl::new();
        control.pause();
        assert!(control.is_paused());

        let resumer = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            resumer.resume();
        });

        let started = Instant::now();
        control.check_pause_status().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(!control.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_releases_a_paused_wait() {
        let control = GenerationControl::new();
        control.pause();

        let aborter = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            aborter.abort();
        });

        let err = control.check_pause_status().await.unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn aborted_control_fails_fast() {
        let control = GenerationControl::new();
        control.abort();
        assert!(control.check_pause_status().await.unwrap_err().is_aborted());
        assert!(control.abort_signal().is_cancelled());
    }
}
