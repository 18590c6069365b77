//! Startup recovery.
//!
//! Replays the WAL into the record store before any connection is served.
//! Replay is a direct-apply path: it never re-logs transaction brackets.
//! It does append the APPLIED marker for each transaction it replays, so
//! a transaction is applied exactly once across any number of restarts.

use crate::error::CoreResult;
use crate::record::{Account, Loan};
use crate::store::RecordFile;
use crate::types::TxId;
use crate::wal::{WalAction, WalLine, WalWriter};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counters reported by a completed replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Committed transactions whose actions were re-applied.
    pub replayed: usize,
    /// Committed transactions skipped because their APPLIED marker was present.
    pub already_applied: usize,
    /// Transactions discarded for lack of a COMMIT line.
    pub discarded: usize,
    /// Lines skipped because they failed to parse.
    pub malformed: usize,
}

enum ReplayState {
    Idle,
    InTransaction(TxId, Vec<WalAction>),
}

/// Replays every committed-but-unapplied transaction in file order.
///
/// State machine per transaction bracket: a `BEGIN` resets the action
/// buffer (discarding any previously open bracket), actions accumulate,
/// and a matching `COMMIT` applies the buffer in order unless the
/// transaction already carries an `APPLIED` marker. Each replayed
/// transaction gets its marker appended once its actions are on disk,
/// so the next restart counts it as already applied. An open bracket at
/// end of file was never committed and is dropped without error.
/// Malformed lines are skipped; recovery is best-effort, not strict.
///
/// # Errors
///
/// Returns a storage error if the log cannot be read or a replayed write
/// fails. Parse failures never abort the whole recovery.
pub fn replay(
    wal: &WalWriter,
    accounts: &RecordFile<Account>,
    loans: &RecordFile<Loan>,
) -> CoreResult<ReplayStats> {
    let lines = wal.lines()?;
    let mut stats = ReplayStats::default();

    // First pass: which transactions already reached the record store.
    let mut applied: HashSet<TxId> = HashSet::new();
    for line in &lines {
        if let Ok(WalLine::Applied(txid)) = WalLine::parse(line) {
            applied.insert(txid);
        }
    }

    // Second pass: state machine over the brackets.
    let mut state = ReplayState::Idle;
    for raw in &lines {
        let line = match WalLine::parse(raw) {
            Ok(line) => line,
            Err(e) => {
                warn!(line = %raw, error = %e, "skipping malformed WAL line");
                stats.malformed += 1;
                continue;
            }
        };

        match line {
            WalLine::Begin(txid) => {
                if let ReplayState::InTransaction(open, _) = &state {
                    warn!(txid = %open, "discarding uncommitted transaction");
                    stats.discarded += 1;
                }
                state = ReplayState::InTransaction(txid, Vec::new());
            }
            WalLine::Action(action) => match &mut state {
                ReplayState::InTransaction(_, actions) => actions.push(action),
                ReplayState::Idle => {
                    warn!(line = %raw, "action line outside a transaction bracket");
                    stats.malformed += 1;
                }
            },
            WalLine::Commit(txid) => match std::mem::replace(&mut state, ReplayState::Idle) {
                ReplayState::InTransaction(open, actions) if open == txid => {
                    if applied.contains(&txid) {
                        stats.already_applied += 1;
                    } else {
                        debug!(txid = %txid, actions = actions.len(), "replaying transaction");
                        for action in &actions {
                            apply(action, accounts, loans)?;
                        }
                        wal.mark_applied(&txid)?;
                        stats.replayed += 1;
                    }
                }
                ReplayState::InTransaction(open, _) => {
                    warn!(open = %open, commit = %txid, "COMMIT for a different transaction");
                    stats.discarded += 1;
                }
                ReplayState::Idle => {
                    warn!(txid = %txid, "COMMIT without a matching BEGIN");
                    stats.malformed += 1;
                }
            },
            WalLine::Applied(_) => {}
        }
    }

    if let ReplayState::InTransaction(open, _) = state {
        // Never committed; the client was never acknowledged.
        warn!(txid = %open, "discarding transaction open at end of log");
        stats.discarded += 1;
    }

    info!(
        replayed = stats.replayed,
        already_applied = stats.already_applied,
        discarded = stats.discarded,
        malformed = stats.malformed,
        "WAL replay complete"
    );
    Ok(stats)
}

fn apply(
    action: &WalAction,
    accounts: &RecordFile<Account>,
    loans: &RecordFile<Loan>,
) -> CoreResult<()> {
    match action {
        WalAction::Debit { acc_no, amount } => {
            if let Some(mut account) = accounts.read(acc_no.as_u32())? {
                account.balance -= amount;
                accounts.write(acc_no.as_u32(), &account)?;
            } else {
                warn!(acc_no = %acc_no, "replayed DEBIT names a missing account");
            }
        }
        WalAction::Credit { acc_no, amount } => {
            if let Some(mut account) = accounts.read(acc_no.as_u32())? {
                account.balance += amount;
                accounts.write(acc_no.as_u32(), &account)?;
            } else {
                warn!(acc_no = %acc_no, "replayed CREDIT names a missing account");
            }
        }
        WalAction::UpdateLoan { loan_id, status } => {
            if let Some(mut loan) = loans.read(loan_id.as_u32())? {
                loan.status = *status;
                loans.write(loan_id.as_u32(), &loan)?;
            } else {
                warn!(loan_id = %loan_id, "replayed UPDATE_LOAN names a missing loan");
            }
        }
    }
    Ok(())
}
