//! insight-storage: persistence for per-(group, day) aggregate state.
//!
//! ## Modules
//!
//! - [`error`] – StorageError
//! - [`sqlite_pool`] – SqlitePoolManager
//! - [`state_repo`] – StateStore trait + StateRepository (SQLite)
//!
//! Saves are guarded by an optimistic version column: a save computed from a
//! stale read is rejected with [`StorageError::StaleState`] instead of
//! silently clobbering a concurrent update.

mod error;
mod sqlite_pool;
mod state_repo;


pub use error::StorageError;
pub use sqlite_pool::SqlitePoolManager;
pub use state_repo::{StateRepository, StateStore, VersionedState, NEW_STATE_VERSION};
