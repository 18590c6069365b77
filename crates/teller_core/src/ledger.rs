//! Ledger facade.
//!
//! The `Ledger` is the explicitly constructed owner of the data directory
//! and every file handle in the process; it is created at service start,
//! injected wherever storage access is needed, and closed at shutdown by
//! dropping it. Opening runs recovery before the engine is handed out, so
//! no transaction can start against an unrecovered store.

use crate::dir::LedgerDir;
use crate::engine::TransactionEngine;
use crate::error::CoreResult;
use crate::recovery::{self, ReplayStats};
use crate::store::RecordFile;
use crate::wal::WalWriter;
use std::path::Path;
use teller_storage::{FileBackend, InMemoryBackend};
use tracing::info;

/// An open ledger: data directory lock, recovered record files, engine.
pub struct Ledger {
    /// Held for the lifetime of the ledger; `None` for in-memory ledgers.
    _dir: Option<LedgerDir>,
    engine: TransactionEngine,
    replay_stats: ReplayStats,
}

impl Ledger {
    /// Opens (or creates) a ledger at the given data directory.
    ///
    /// The three files are created if absent and the WAL is replayed
    /// unconditionally before this returns.
    ///
    /// # Errors
    ///
    /// Returns `LedgerLocked` if another process owns the directory, or
    /// any storage error from opening or replaying the files.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let dir = LedgerDir::open(path)?;

        let accounts = RecordFile::new(Box::new(FileBackend::open(&dir.accounts_path())?));
        let loans = RecordFile::new(Box::new(FileBackend::open(&dir.loans_path())?));
        let wal = WalWriter::new(Box::new(FileBackend::open(&dir.wal_path())?));

        let replay_stats = recovery::replay(&wal, &accounts, &loans)?;
        info!(path = %path.display(), "ledger opened");

        Ok(Self {
            _dir: Some(dir),
            engine: TransactionEngine::new(accounts, loans, wal),
            replay_stats,
        })
    }

    /// Opens an ephemeral in-memory ledger, for tests.
    ///
    /// # Errors
    ///
    /// Propagates replay errors, though an empty in-memory WAL has
    /// nothing to replay.
    pub fn open_in_memory() -> CoreResult<Self> {
        let accounts = RecordFile::new(Box::new(InMemoryBackend::new()));
        let loans = RecordFile::new(Box::new(InMemoryBackend::new()));
        let wal = WalWriter::new(Box::new(InMemoryBackend::new()));

        let replay_stats = recovery::replay(&wal, &accounts, &loans)?;

        Ok(Self {
            _dir: None,
            engine: TransactionEngine::new(accounts, loans, wal),
            replay_stats,
        })
    }

    /// Returns the transaction engine.
    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    /// Returns the counters from the startup replay.
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("replay_stats", &self.replay_stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountNo, Role};
    use tempfile::tempdir;

    #[test]
    fn open_creates_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger");

        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.replay_stats(), ReplayStats::default());
        assert!(path.join("accounts.dat").exists());
        assert!(path.join("loans.dat").exists());
        assert!(path.join("wal.log").exists());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger");

        {
            let ledger = Ledger::open(&path).unwrap();
            ledger
                .engine()
                .add_account(Role::Customer, "cust101", "pw", 1500.0)
                .unwrap();
            ledger.engine().deposit(AccountNo::new(1), 250.0).unwrap();
        }

        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.engine().balance(AccountNo::new(1)).unwrap(), 1750.0);
        // The deposit carried an APPLIED marker, so reopening replayed nothing.
        assert_eq!(ledger.replay_stats().replayed, 0);
        assert_eq!(ledger.replay_stats().already_applied, 1);
    }

    #[test]
    fn committed_unapplied_wal_entry_is_replayed_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger");

        {
            let ledger = Ledger::open(&path).unwrap();
            ledger
                .engine()
                .add_account(Role::Customer, "cust101", "pw", 1000.0)
                .unwrap();
        }

        // Simulate a crash after COMMIT but before apply: append a bracket
        // with no APPLIED marker behind the ledger's back.
        std::fs::OpenOptions::new()
            .append(true)
            .open(path.join("wal.log"))
            .and_then(|mut f| {
                use std::io::Write;
                writeln!(f, "BEGIN tx-crash-0")?;
                writeln!(f, "CREDIT 1 500.00")?;
                writeln!(f, "COMMIT tx-crash-0")
            })
            .unwrap();

        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.replay_stats().replayed, 1);
        assert_eq!(ledger.engine().balance(AccountNo::new(1)).unwrap(), 1500.0);
        drop(ledger);

        // Replay left an APPLIED marker behind, so a later restart must
        // not apply the same transaction a second time.
        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.replay_stats().replayed, 0);
        assert_eq!(ledger.replay_stats().already_applied, 1);
        assert_eq!(ledger.engine().balance(AccountNo::new(1)).unwrap(), 1500.0);
    }

    #[test]
    fn in_memory_ledger_works() {
        let ledger = Ledger::open_in_memory().unwrap();
        let acc = ledger
            .engine()
            .add_account(Role::Customer, "cust", "pw", 10.0)
            .unwrap();
        assert_eq!(ledger.engine().balance(acc).unwrap(), 10.0);
    }
}
