//! # Reference Count Table
//!
//! The per-session arena that stands in for cross-process garbage collection.
//! Maps a remote object identifier to the number of live local handles.
//!
//! ## Invariants
//!
//! - Counts never go below zero. An entry exists only while its count is positive.
//! - An entry is removed exactly once, on the transition to zero; the caller
//!   then issues the single remote release.
//! - Releasing an identifier with no entry is a no-op, which guards against
//!   double finalization during teardown.
//!
//! Uses DashMap so handles may be dropped from any thread without a global lock.
//! Decrement-and-remove happens under the entry lock, so two racing releases
//! can never both observe the transition to zero.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use osapack::ObjectId;

/// Outcome of one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other handles remain; carries the remaining count.
    Retained(usize),
    /// The count reached zero and the entry is gone. The remote object must
    /// now be released.
    Freed,
    /// There was no entry. Nothing to do.
    Untracked,
}

/// Live local handle counts, keyed by remote object identifier.
#[derive(Debug, Default)]
pub struct RefTable {
    counts: DashMap<ObjectId, usize>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for `id`, creating the entry at 1. Returns the new count.
    pub fn acquire(&self, id: ObjectId) -> usize {
        let mut count = self.counts.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// Decrements the count for `id`.
    pub fn release(&self, id: ObjectId) -> Release {
        match self.counts.entry(id) {
            Entry::Vacant(_) => Release::Untracked,
            Entry::Occupied(mut entry) => {
                let remaining = {
                    let count = entry.get_mut();
                    *count = count.saturating_sub(1);
                    *count
                };
                if remaining == 0 {
                    entry.remove();
                    Release::Freed
                } else {
                    Release::Retained(remaining)
                }
            }
        }
    }

    /// Current count for `id`; zero when untracked.
    pub fn count(&self, id: ObjectId) -> usize {
        self.counts.get(&id).map(|c| *c).unwrap_or(0)
    }

    /// Number of remote objects currently held.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_acquire_creates_entry() {
        let table = RefTable::new();
        assert_eq!(table.acquire(1), 1);
        assert_eq!(table.acquire(1), 2);
        assert_eq!(table.count(1), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_to_zero_frees_once() {
        let table = RefTable::new();
        table.acquire(7);
        table.acquire(7);
        assert_eq!(table.release(7), Release::Retained(1));
        assert_eq!(table.release(7), Release::Freed);
        assert_eq!(table.release(7), Release::Untracked);
        assert!(table.is_empty());
    }

    #[test]
    fn test_release_without_acquire_is_noop() {
        let table = RefTable::new();
        assert_eq!(table.release(3), Release::Untracked);
        assert_eq!(table.count(3), 0);
    }

    #[test]
    fn test_concurrent_releases_free_exactly_once() {
        let table = std::sync::Arc::new(RefTable::new());
        for _ in 0..64 {
            table.acquire(9);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    (0..8).filter(|_| table.release(9) == Release::Freed).count()
                })
            })
            .collect();

        let freed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(freed, 1);
        assert!(table.is_empty());
    }

    proptest! {
        #[test]
        fn prop_count_never_negative(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let table = RefTable::new();
            let mut model: usize = 0;
            for acquire in ops {
                if acquire {
                    model += 1;
                    prop_assert_eq!(table.acquire(1), model);
                } else {
                    let outcome = table.release(1);
                    match model {
                        0 => prop_assert_eq!(outcome, Release::Untracked),
                        1 => prop_assert_eq!(outcome, Release::Freed),
                        n => prop_assert_eq!(outcome, Release::Retained(n - 1)),
                    }
                    model = model.saturating_sub(1);
                }
                prop_assert_eq!(table.count(1), model);
            }
        }
    }
}
