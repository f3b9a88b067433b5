use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod division;

pub use division::{District, DivisionLevel, Province, Ward};

/// Loader lifecycle for one cache generation
///
/// `Loading` falls back to `Unloaded` on failure; there is no externally
/// observable partially-loaded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// What a call to `ensure_loaded` ended up doing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The guard flag was already present; nothing was fetched or written
    AlreadyLoaded,
    /// A full generation was fetched, written and the guard set
    Loaded(LoadReport),
    /// Upstream returned no provinces; nothing was written and the guard stays unset
    Empty,
    /// Another process holds the load lock
    InProgressElsewhere,
}

/// Counters for one completed generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub provinces: usize,
    pub districts: usize,
    pub wards: usize,
    /// Records dropped because their code was absent
    pub skipped: usize,
    /// Name-index memberships added
    pub index_entries: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LoadReport {
    pub fn cached_records(&self) -> usize {
        self.provinces + self.districts + self.wards
    }
}

/// Snapshot published by the load state manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadProgress {
    pub state: LoadState,
    pub current_step: String,
    pub triggered_by: Option<LoadTrigger>,
    pub attempt_started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub last_report: Option<LoadReport>,
    pub last_error: Option<String>,
}

/// Who asked for a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadTrigger {
    Startup,
    Scheduler,
    Manual,
}

impl std::fmt::Display for LoadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadTrigger::Startup => write!(f, "startup"),
            LoadTrigger::Scheduler => write!(f, "scheduler"),
            LoadTrigger::Manual => write!(f, "manual"),
        }
    }
}
