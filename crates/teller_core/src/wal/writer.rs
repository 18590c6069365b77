//! WAL writer.

use crate::error::CoreResult;
use crate::types::TxId;
use crate::wal::line::{WalAction, WalLine};
use parking_lot::Mutex;
use teller_storage::StorageBackend;

/// Append-only writer over the WAL file.
///
/// The whole BEGIN..COMMIT bracket of a transaction is rendered into one
/// buffer and appended under a single lock hold, so lines of concurrent
/// transactions never interleave and file order matches logical commit
/// order. Every append is followed by a durability barrier.
pub struct WalWriter {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl WalWriter {
    /// Creates a WAL writer over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Appends a full transaction bracket: BEGIN, the action lines in
    /// order, COMMIT. Once this returns, the transaction is durable.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the append or sync fails; nothing is
    /// considered committed in that case.
    pub fn log_transaction(&self, txid: &TxId, actions: &[WalAction]) -> CoreResult<()> {
        let mut buf = String::new();
        push_line(&mut buf, &WalLine::Begin(txid.clone()));
        for action in actions {
            push_line(&mut buf, &WalLine::Action(action.clone()));
        }
        push_line(&mut buf, &WalLine::Commit(txid.clone()));

        let mut backend = self.backend.lock();
        backend.append(buf.as_bytes())?;
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Appends the APPLIED marker for a transaction whose effects have
    /// reached the record store. Replay skips marked transactions.
    pub fn mark_applied(&self, txid: &TxId) -> CoreResult<()> {
        let mut buf = String::new();
        push_line(&mut buf, &WalLine::Applied(txid.clone()));

        let mut backend = self.backend.lock();
        backend.append(buf.as_bytes())?;
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().len()?)
    }

    /// Reads the raw log back as lines, in file order.
    ///
    /// This is the input to recovery and to the `teller wal` dump; the
    /// lines are returned unparsed so malformed ones can be reported and
    /// skipped individually.
    pub fn lines(&self) -> CoreResult<Vec<String>> {
        let backend = self.backend.lock();
        let len = backend.len()?;
        if len == 0 {
            return Ok(Vec::new());
        }

        let bytes = backend.read_at(0, len as usize)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }
}

fn push_line(buf: &mut String, line: &WalLine) {
    buf.push_str(&line.to_string());
    buf.push('\n');
}

impl std::fmt::Debug for WalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountNo;
    use teller_storage::InMemoryBackend;

    fn writer() -> WalWriter {
        WalWriter::new(Box::new(InMemoryBackend::new()))
    }

    #[test]
    fn empty_log_has_no_lines() {
        let wal = writer();
        assert_eq!(wal.size().unwrap(), 0);
        assert!(wal.lines().unwrap().is_empty());
    }

    #[test]
    fn bracket_is_written_in_order() {
        let wal = writer();
        let txid = TxId::generate();

        wal.log_transaction(
            &txid,
            &[
                WalAction::Debit {
                    acc_no: AccountNo::new(1),
                    amount: 500.0,
                },
                WalAction::Credit {
                    acc_no: AccountNo::new(2),
                    amount: 500.0,
                },
            ],
        )
        .unwrap();

        let lines = wal.lines().unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("BEGIN {txid}"));
        assert_eq!(lines[1], "DEBIT 1 500.00");
        assert_eq!(lines[2], "CREDIT 2 500.00");
        assert_eq!(lines[3], format!("COMMIT {txid}"));
    }

    #[test]
    fn applied_marker_follows_bracket() {
        let wal = writer();
        let txid = TxId::generate();

        wal.log_transaction(
            &txid,
            &[WalAction::Credit {
                acc_no: AccountNo::new(2),
                amount: 100.0,
            }],
        )
        .unwrap();
        wal.mark_applied(&txid).unwrap();

        let lines = wal.lines().unwrap();
        assert_eq!(lines.last().unwrap(), &format!("APPLIED {txid}"));
    }

    #[test]
    fn brackets_do_not_interleave_across_transactions() {
        let wal = writer();
        let t1 = TxId::generate();
        let t2 = TxId::generate();

        wal.log_transaction(
            &t1,
            &[WalAction::Credit {
                acc_no: AccountNo::new(1),
                amount: 1.0,
            }],
        )
        .unwrap();
        wal.log_transaction(
            &t2,
            &[WalAction::Credit {
                acc_no: AccountNo::new(2),
                amount: 2.0,
            }],
        )
        .unwrap();

        let lines = wal.lines().unwrap();
        assert_eq!(lines[0], format!("BEGIN {t1}"));
        assert_eq!(lines[2], format!("COMMIT {t1}"));
        assert_eq!(lines[3], format!("BEGIN {t2}"));
        assert_eq!(lines[5], format!("COMMIT {t2}"));
    }
}
