//! Read-side services over the location cache

pub mod lookup;

pub use lookup::{LoadStatus, LocationLookupService, SearchMatch, SearchResult};
