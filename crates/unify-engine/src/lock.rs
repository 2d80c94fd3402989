use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use unify_types::MergePair;

/// In-process advisory locks, one per (from, to) pair.
///
/// A second merge of a pair that is already running is refused rather than
/// interleaved with the first. Disjoint pairs never contend.
#[derive(Debug, Default)]
pub struct PairLocks {
    held: Mutex<HashSet<(String, String)>>,
}

/// Releases its pair when dropped.
#[derive(Debug)]
pub struct PairGuard<'a> {
    locks: &'a PairLocks,
    key: (String, String),
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `pair`, or `None` if another merge holds it.
    pub fn try_acquire(&self, pair: &MergePair) -> Option<PairGuard<'_>> {
        let key = (
            pair.from.as_str().to_ascii_lowercase(),
            pair.to.as_str().to_ascii_lowercase(),
        );
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return None;
        }
        Some(PairGuard { locks: self, key })
    }

    pub fn is_held(&self, pair: &MergePair) -> bool {
        let key = (
            pair.from.as_str().to_ascii_lowercase(),
            pair.to.as_str().to_ascii_lowercase(),
        );
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
