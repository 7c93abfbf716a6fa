//! Snapshot-mutate-commit state channel.
//!
//! All facility mutation goes through [`StateChannel::update`]. The closure
//! works on a copy of the snapshot and the copy replaces the snapshot only
//! when the closure returns `Ok`, so a failed update never leaves partial
//! state behind. Exclusive access (`&mut self`) serializes every writer.

use crate::error::Result;

/// Owner of a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateChannel<S> {
    snapshot: S,
    revision: u64,
}

impl<S: Clone> StateChannel<S> {
    /// Wrap an initial snapshot.
    #[must_use]
    pub const fn new(snapshot: S) -> Self {
        Self {
            snapshot,
            revision: 0,
        }
    }

    /// Current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Number of committed updates.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Run `f` against a working copy and commit it if `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns; the snapshot is untouched in that case.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        let mut working = self.snapshot.clone();
        let value = f(&mut working)?;
        self.snapshot = working;
        self.revision += 1;
        Ok(value)
    }

    /// Give up the channel, keeping the snapshot.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.snapshot
    }
}
