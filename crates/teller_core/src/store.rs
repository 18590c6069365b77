//! Fixed-slot record store.
//!
//! Maps a 1-based numeric key to a fixed-size record slot at
//! `(key - 1) * R::SIZE`. Keys are dense and derived purely from the file
//! length; there is no separate key-allocation ledger. The store owns its
//! backend and is the only component that touches the record files.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use parking_lot::Mutex;
use std::marker::PhantomData;
use teller_storage::{StorageBackend, StorageError};

/// A keyed, fixed-slot record file over an opaque storage backend.
///
/// Every successful write is followed by a durability barrier before it
/// returns, so a write completed while holding a record's lock is visible
/// to the next reader that acquires the same lock.
pub struct RecordFile<R: Record> {
    backend: Mutex<Box<dyn StorageBackend>>,
    _marker: PhantomData<R>,
}

impl<R: Record> RecordFile<R> {
    /// Creates a record file over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
            _marker: PhantomData,
        }
    }

    /// Reads the record at `key`.
    ///
    /// Returns `Ok(None)` for key 0 or a key beyond the current extent;
    /// bad keys from untrusted input must never abort a serving thread.
    ///
    /// # Errors
    ///
    /// Returns `CorruptRecord` if the slot decodes to garbage, or a
    /// storage error on I/O failure.
    pub fn read(&self, key: u32) -> CoreResult<Option<R>> {
        if key == 0 {
            return Ok(None);
        }

        let backend = self.backend.lock();
        let offset = u64::from(key - 1) * R::SIZE as u64;

        match backend.read_at(offset, R::SIZE) {
            Ok(bytes) => Ok(Some(R::decode(&bytes)?)),
            Err(StorageError::ReadPastEnd { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrites the record at `key` in place, then syncs.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`-style lookups at the engine layer; here a
    /// write past the extent surfaces as a storage error.
    pub fn write(&self, key: u32, record: &R) -> CoreResult<()> {
        if key == 0 {
            return Err(CoreError::corrupt_record("write to record key 0"));
        }

        let mut backend = self.backend.lock();
        let offset = u64::from(key - 1) * R::SIZE as u64;
        backend.write_at(offset, &record.encode())?;
        backend.sync()?;
        Ok(())
    }

    /// Appends a record at the next free key and returns that key.
    ///
    /// The key is computed and the slot written under one backend lock
    /// hold, so concurrent appends cannot collide on a key. The builder
    /// receives the allocated key so it can stamp it into the record.
    pub fn append_with(&self, build: impl FnOnce(u32) -> R) -> CoreResult<u32> {
        let mut backend = self.backend.lock();
        let len = backend.len()?;
        let key = (len / R::SIZE as u64 + 1) as u32;

        let record = build(key);
        backend.write_at(len, &record.encode())?;
        backend.sync()?;
        Ok(key)
    }

    /// Returns the next key an append would allocate.
    pub fn next_key(&self) -> CoreResult<u32> {
        let backend = self.backend.lock();
        Ok((backend.len()? / R::SIZE as u64 + 1) as u32)
    }

    /// Returns the number of record slots in the file.
    pub fn count(&self) -> CoreResult<u32> {
        let backend = self.backend.lock();
        Ok((backend.len()? / R::SIZE as u64) as u32)
    }

    /// Reads every record in key order.
    ///
    /// Used for role listings and tooling; mutation never goes through
    /// this path.
    pub fn scan(&self) -> CoreResult<Vec<R>> {
        let backend = self.backend.lock();
        let count = backend.len()? / R::SIZE as u64;

        let mut records = Vec::with_capacity(count as usize);
        for slot in 0..count {
            let bytes = backend.read_at(slot * R::SIZE as u64, R::SIZE)?;
            records.push(R::decode(&bytes)?);
        }
        Ok(records)
    }
}

impl<R: Record> std::fmt::Debug for RecordFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFile")
            .field("record_size", &R::SIZE)
            .finish_non_exhaustive()
    }
}
