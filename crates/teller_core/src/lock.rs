//! Per-record lock table.
//!
//! Serializes access to individual record slots across connection threads.
//! Locks are advisory: they bind only callers that go through this table,
//! which is every mutation path in the engine. The table is an explicit
//! in-process mutex-and-condvar structure rather than OS file locks, so
//! behavior is identical whatever backend the record files sit on.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;

/// Which record file a lock key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// The account file.
    Accounts,
    /// The loan file.
    Loans,
}

/// Lock modes for record access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock for reads; multiple readers may hold it together.
    Shared,
    /// Exclusive lock for mutation; sole owner, no concurrent readers.
    Exclusive,
}

type LockKey = (RecordKind, u32);

#[derive(Debug, Default)]
struct SlotState {
    readers: usize,
    writer: bool,
}

impl SlotState {
    fn grants(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => !self.writer,
            LockMode::Exclusive => !self.writer && self.readers == 0,
        }
    }

    fn is_free(&self) -> bool {
        !self.writer && self.readers == 0
    }
}

/// Blocking per-key lock table.
///
/// `acquire` blocks the calling thread until the lock is granted; there is
/// no timeout, so a stuck holder stalls all contenders on that key. Guards
/// release on drop, and release tolerates a slot that is already free, so
/// partial-failure unlock paths are always safe.
///
/// Two-record operations must lock in ascending key order. Use
/// [`LockTable::acquire_pair`], which enforces the order regardless of the
/// caller's from/to direction, making acquisition order total and
/// deadlock-free for opposing transfers.
#[derive(Debug, Default)]
pub struct LockTable {
    slots: Mutex<HashMap<LockKey, SlotState>>,
    released: Condvar,
}

impl LockTable {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock on `(kind, key)` is granted in `mode`.
    pub fn acquire(&self, kind: RecordKind, key: u32, mode: LockMode) -> LockGuard<'_> {
        let lock_key = (kind, key);
        let mut slots = self.slots.lock();

        loop {
            let state = slots.entry(lock_key).or_default();
            if state.grants(mode) {
                match mode {
                    LockMode::Shared => state.readers += 1,
                    LockMode::Exclusive => state.writer = true,
                }
                return LockGuard {
                    table: self,
                    key: lock_key,
                    mode,
                    released: false,
                };
            }
            self.released.wait(&mut slots);
        }
    }

    /// Acquires two keys of the same kind in ascending key order.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`; callers reject same-key pairs before locking.
    pub fn acquire_pair(
        &self,
        kind: RecordKind,
        a: u32,
        b: u32,
        mode: LockMode,
    ) -> (LockGuard<'_>, LockGuard<'_>) {
        assert_ne!(a, b, "lock pair must name two distinct records");
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let first = self.acquire(kind, lo, mode);
        let second = self.acquire(kind, hi, mode);
        if a < b {
            (first, second)
        } else {
            (second, first)
        }
    }

    /// Returns true if no lock is currently held anywhere in the table.
    pub fn is_idle(&self) -> bool {
        self.slots.lock().values().all(SlotState::is_free)
    }

    fn release(&self, key: LockKey, mode: LockMode) {
        let mut slots = self.slots.lock();

        // Idempotent: releasing a key that is already free is a no-op.
        if let Some(state) = slots.get_mut(&key) {
            match mode {
                LockMode::Shared => state.readers = state.readers.saturating_sub(1),
                LockMode::Exclusive => state.writer = false,
            }
            if state.is_free() {
                slots.remove(&key);
            }
        }
        drop(slots);
        self.released.notify_all();
    }
}

/// A held record lock. Releases on drop.
#[must_use = "dropping the guard releases the lock"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    key: LockKey,
    mode: LockMode,
    released: bool,
}

impl LockGuard<'_> {
    /// Releases the lock early. Safe to call at most once; the drop path
    /// becomes a no-op afterwards.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.table.release(self.key, self.mode);
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
