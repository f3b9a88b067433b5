use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::models::{LoadProgress, LoadReport, LoadState, LoadTrigger};

/// In-process view of the loader lifecycle
///
/// The store's guard flag stays the source of truth for "a generation
/// completed"; this only mirrors what this process has observed so the
/// status endpoint and subscribers can report it.
#[derive(Clone)]
pub struct LoadStateManager {
    progress: Arc<RwLock<LoadProgress>>,
    progress_tx: broadcast::Sender<LoadProgress>,
}

impl LoadStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            progress: Arc::new(RwLock::new(LoadProgress {
                state: LoadState::Unloaded,
                current_step: "Idle".to_string(),
                triggered_by: None,
                attempt_started_at: None,
                updated_at: Utc::now(),
                last_report: None,
                last_error: None,
            })),
            progress_tx,
        }
    }

    pub async fn start_load(&self, trigger: LoadTrigger) {
        let now = Utc::now();
        self.update(|progress| {
            progress.state = LoadState::Loading;
            progress.current_step = "Fetching divisions".to_string();
            progress.triggered_by = Some(trigger);
            progress.attempt_started_at = Some(now);
        })
        .await;
    }

    pub async fn update_step(&self, step: impl Into<String>) {
        let step = step.into();
        self.update(|progress| progress.current_step = step).await;
    }

    pub async fn complete_load(&self, report: LoadReport) {
        let step = format!(
            "Completed - {} records cached, {} skipped",
            report.cached_records(),
            report.skipped
        );
        self.update(|progress| {
            progress.state = LoadState::Loaded;
            progress.current_step = step;
            progress.last_report = Some(report);
            progress.last_error = None;
        })
        .await;
    }

    /// The guard was found present, possibly written by another process
    pub async fn mark_loaded(&self) {
        self.update(|progress| {
            if progress.state != LoadState::Loaded {
                progress.state = LoadState::Loaded;
                progress.current_step = "Loaded (guard present)".to_string();
            }
        })
        .await;
    }

    /// Leave `Loading` without recording an error
    ///
    /// `still_loaded` is true when an earlier generation's guard is still
    /// in the store, in which case the state returns to `Loaded`.
    pub async fn reset(&self, step: impl Into<String>, still_loaded: bool) {
        let step = step.into();
        self.update(|progress| {
            progress.state = settled_state(still_loaded);
            progress.current_step = step;
        })
        .await;
    }

    pub async fn set_error(&self, error: String, still_loaded: bool) {
        self.update(|progress| {
            progress.state = settled_state(still_loaded);
            progress.current_step = "Failed".to_string();
            progress.last_error = Some(error);
        })
        .await;
    }

    pub async fn get_progress(&self) -> LoadProgress {
        self.progress.read().await.clone()
    }

    pub async fn state(&self) -> LoadState {
        self.progress.read().await.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadProgress> {
        self.progress_tx.subscribe()
    }

    async fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut LoadProgress),
    {
        let snapshot = {
            let mut progress = self.progress.write().await;
            apply(&mut progress);
            progress.updated_at = Utc::now();
            progress.clone()
        };

        let _ = self.progress_tx.send(snapshot);
    }
}

impl Default for LoadStateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn settled_state(still_loaded: bool) -> LoadState {
    if still_loaded {
        LoadState::Loaded
    } else {
        LoadState::Unloaded
    }
}
