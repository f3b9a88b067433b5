//! Location lookups against the cache
//!
//! Reads only what a completed (or in-progress) generation has written. The
//! name index stores bare codes, and province, district and ward codes come
//! from separate sequences, so a search resolves each code at every level
//! and keeps the records whose own name normalizes to the query.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStore};
use crate::errors::{AppError, AppResult};
use crate::ingestor::LoadStateManager;
use crate::models::{DivisionLevel, LoadProgress};
use crate::utils::normalize_name;

const SEARCH_LEVELS: [DivisionLevel; 3] = [
    DivisionLevel::Province,
    DivisionLevel::District,
    DivisionLevel::Ward,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub level: DivisionLevel,
    pub code: u32,
    pub record: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub normalized: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStatus {
    /// Whether the `location:loaded` guard is present in the store
    pub loaded: bool,
    /// Completion timestamp stored in the guard
    pub loaded_at: Option<String>,
    pub progress: LoadProgress,
}

#[derive(Clone)]
pub struct LocationLookupService {
    store: Arc<dyn CacheStore>,
    state: LoadStateManager,
}

impl LocationLookupService {
    pub fn new(store: Arc<dyn CacheStore>, state: LoadStateManager) -> Self {
        Self { store, state }
    }

    /// Cached record for one division
    pub async fn get_division(&self, level: DivisionLevel, code: u32) -> AppResult<Value> {
        self.find_division(level, code)
            .await?
            .ok_or_else(|| AppError::not_found(level.as_str(), code.to_string()))
    }

    /// Divisions whose name normalizes to the same key as `name`
    pub async fn search(&self, name: &str) -> AppResult<SearchResult> {
        let normalized = normalize_name(name);
        let mut matches = Vec::new();

        if !normalized.is_empty() {
            let codes = self
                .store
                .set_members(&CacheKey::name_index(normalized.as_str()).to_string())
                .await?;

            for code in codes.iter().filter_map(|code| code.parse::<u32>().ok()) {
                for level in SEARCH_LEVELS {
                    let Some(record) = self.find_division(level, code).await? else {
                        continue;
                    };
                    let record_name = record.get("name").and_then(Value::as_str);
                    if record_name.map(normalize_name).as_deref() == Some(normalized.as_str()) {
                        matches.push(SearchMatch {
                            level,
                            code,
                            record,
                        });
                    }
                }
            }
        }

        Ok(SearchResult {
            query: name.to_string(),
            normalized,
            matches,
        })
    }

    pub async fn status(&self) -> AppResult<LoadStatus> {
        let loaded_at = self
            .store
            .get_string(&CacheKey::LoadedGuard.to_string())
            .await?;

        Ok(LoadStatus {
            loaded: loaded_at.is_some(),
            loaded_at,
            progress: self.state.get_progress().await,
        })
    }

    async fn find_division(&self, level: DivisionLevel, code: u32) -> AppResult<Option<Value>> {
        let key = CacheKey::division(level, code).to_string();
        match self.store.get_string(&key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::internal(format!("Corrupt cache entry {key}: {e}"))),
            None => Ok(None),
        }
    }
}
