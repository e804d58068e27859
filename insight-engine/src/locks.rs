//! Per-(group, day) serialization of the load-merge-save sequence.
//!
//! Two passes for the same key (say a manual trigger overlapping the
//! scheduler) would otherwise both read the pre-merge state and the second
//! save would clobber the first — the classic lost update. Each key gets
//! one async mutex held across the whole sequence; different keys never
//! contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use insight_core::StateKey;

#[derive(Default)]
pub struct StateLocks {
    inner: DashMap<StateKey, Arc<Mutex<()>>>,
}

impl StateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex for `key`, creating it on first use. Entries stay
    /// until [`Self::prune_older_than`] sweeps them out with the stored
    /// state they guarded.
    pub fn for_key(&self, key: &StateKey) -> Arc<Mutex<()>> {
        self.inner
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops entries whose date key precedes `cutoff` (%Y-%m-%d, so string
    /// order is date order). An entry someone still holds a clone of is
    /// kept, whatever its age.
    pub fn prune_older_than(&self, cutoff: &str) {
        self.inner
            .retain(|key, lock| key.date_key.as_str() >= cutoff || Arc::strong_count(lock) > 1);
    }
}
