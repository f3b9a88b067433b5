//! Loading the location cache: the loader itself, its observable state and
//! the triggers that drive it.

pub mod location_loader;
pub mod scheduler;
pub mod state_manager;

pub use location_loader::LocationCacheLoader;
pub use scheduler::{spawn_load, LocationScheduler};
pub use state_manager::LoadStateManager;
