//! Per-discipline-key mutual exclusion.
//!
//! # Invariants
//! - A guard holds all of its keys at once; acquisition waits until every
//!   requested key is free, so multi-key holders (renames) cannot deadlock.
//! - Keys are released when the guard drops.

use crate::model::discipline::DisciplineKey;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Table of discipline keys currently held by mutating operations.
#[derive(Default)]
pub struct KeyLocks {
    held: Mutex<HashSet<DisciplineKey>>,
    released: Condvar,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every key in `keys` is free, then holds them all.
    pub fn acquire(&self, keys: &[&DisciplineKey]) -> KeyGuard<'_> {
        let mut wanted: Vec<DisciplineKey> = keys.iter().map(|key| (*key).clone()).collect();
        wanted.sort();
        wanted.dedup();

        let mut held = self.table();
        while wanted.iter().any(|key| held.contains(key)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(wanted.iter().cloned());

        KeyGuard {
            locks: self,
            keys: wanted,
        }
    }

    // The set stays consistent under poisoning: holders only insert/remove.
    fn table(&self) -> MutexGuard<'_, HashSet<DisciplineKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its keys on drop.
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    keys: Vec<DisciplineKey>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.table();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
