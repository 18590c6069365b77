//! Data directory management.
//!
//! File system layout for a ledger:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK           # Advisory lock, one server process per directory
//! ├─ accounts.dat   # Fixed-slot account records
//! ├─ loans.dat      # Fixed-slot loan records
//! └─ wal.log        # Write-ahead log (text lines)
//! ```
//!
//! The LOCK file ensures only one process serves a data directory at a
//! time; the record locks inside that process do the fine-grained work.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const ACCOUNTS_FILE: &str = "accounts.dat";
const LOANS_FILE: &str = "loans.dat";
const WAL_FILE: &str = "wal.log";

/// Owns a ledger data directory and its process-exclusive lock.
///
/// Dropping the `LedgerDir` releases the lock.
#[derive(Debug)]
pub struct LedgerDir {
    path: PathBuf,
    _lock_file: File,
}

impl LedgerDir {
    /// Opens a data directory, creating it (and the lock file) if absent.
    ///
    /// # Errors
    ///
    /// Returns `LedgerLocked` if another process holds the lock, or an
    /// I/O error if the directory or lock file cannot be created.
    pub fn open(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| CoreError::LedgerLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the account record file.
    #[must_use]
    pub fn accounts_path(&self) -> PathBuf {
        self.path.join(ACCOUNTS_FILE)
    }

    /// Path of the loan record file.
    #[must_use]
    pub fn loans_path(&self) -> PathBuf {
        self.path.join(LOANS_FILE)
    }

    /// Path of the write-ahead log.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }
}
