//! Cache key namespace
//!
//! Every key the loader reads or writes is built here so the layout shared
//! with other consumers of the store is defined in one place:
//!
//! | key                              | value                              |
//! |----------------------------------|------------------------------------|
//! | `province:code:{code}`           | JSON province                      |
//! | `district:code:{code}`           | JSON district                      |
//! | `ward:code:{code}`               | JSON ward (when wards are enabled) |
//! | `location:name:{normalizedName}` | set of codes                       |
//! | `location:loaded`                | guard flag                         |
//! | `location:loading`               | cross-process load lock            |

use std::fmt;

use crate::models::DivisionLevel;

pub const LOADED_GUARD_KEY: &str = "location:loaded";
pub const LOADING_LOCK_KEY: &str = "location:loading";
pub const NAME_INDEX_PREFIX: &str = "location:name:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Serialized division record
    Division(DivisionLevel, u32),
    /// Name-search index set for a normalized name
    NameIndex(String),
    /// Presence marks a completed generation
    LoadedGuard,
    /// Held while a process is loading
    LoadingLock,
}

impl CacheKey {
    pub fn division(level: DivisionLevel, code: u32) -> Self {
        Self::Division(level, code)
    }

    pub fn name_index<S: Into<String>>(normalized_name: S) -> Self {
        Self::NameIndex(normalized_name.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Division(level, code) => write!(f, "{}:code:{}", level.as_str(), code),
            CacheKey::NameIndex(name) => write!(f, "{NAME_INDEX_PREFIX}{name}"),
            CacheKey::LoadedGuard => f.write_str(LOADED_GUARD_KEY),
            CacheKey::LoadingLock => f.write_str(LOADING_LOCK_KEY),
        }
    }
}
