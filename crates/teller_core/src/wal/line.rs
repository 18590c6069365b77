//! WAL line format.

use crate::error::{CoreError, CoreResult};
use crate::types::{AccountNo, LoanId, LoanStatus, TxId};
use std::fmt;

/// A balance- or loan-mutating action inside a transaction bracket.
#[derive(Debug, Clone, PartialEq)]
pub enum WalAction {
    /// Subtract `amount` from the account balance.
    Debit {
        /// The debited account.
        acc_no: AccountNo,
        /// Amount, strictly positive.
        amount: f64,
    },
    /// Add `amount` to the account balance.
    Credit {
        /// The credited account.
        acc_no: AccountNo,
        /// Amount, strictly positive.
        amount: f64,
    },
    /// Set a loan record's status.
    UpdateLoan {
        /// The loan being updated.
        loan_id: LoanId,
        /// The new status.
        status: LoanStatus,
    },
}

/// One parsed WAL line.
#[derive(Debug, Clone, PartialEq)]
pub enum WalLine {
    /// Opens a transaction bracket.
    Begin(TxId),
    /// An action belonging to the open bracket.
    Action(WalAction),
    /// Closes a transaction bracket; the transaction is now durable.
    Commit(TxId),
    /// The transaction's effects have reached the record store.
    Applied(TxId),
}

impl WalLine {
    /// Parses one log line.
    ///
    /// # Errors
    ///
    /// Returns `WalCorruption` on an unknown verb, missing fields, or
    /// unparseable numbers. Recovery treats that as a skippable line.
    pub fn parse(line: &str) -> CoreResult<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| CoreError::wal_corruption("empty WAL line"))?;

        let result = match verb {
            "BEGIN" => Self::Begin(parse_txid(parts.next(), line)?),
            "COMMIT" => Self::Commit(parse_txid(parts.next(), line)?),
            "APPLIED" => Self::Applied(parse_txid(parts.next(), line)?),
            "DEBIT" => Self::Action(WalAction::Debit {
                acc_no: AccountNo::new(parse_key(parts.next(), line)?),
                amount: parse_amount(parts.next(), line)?,
            }),
            "CREDIT" => Self::Action(WalAction::Credit {
                acc_no: AccountNo::new(parse_key(parts.next(), line)?),
                amount: parse_amount(parts.next(), line)?,
            }),
            "UPDATE_LOAN" => Self::Action(WalAction::UpdateLoan {
                loan_id: LoanId::new(parse_key(parts.next(), line)?),
                status: parse_status(parts.next(), line)?,
            }),
            other => {
                return Err(CoreError::wal_corruption(format!(
                    "unknown WAL verb {other:?} in line {line:?}"
                )))
            }
        };

        if parts.next().is_some() {
            return Err(CoreError::wal_corruption(format!(
                "trailing fields in WAL line {line:?}"
            )));
        }
        Ok(result)
    }
}

impl fmt::Display for WalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalLine::Begin(txid) => write!(f, "BEGIN {txid}"),
            WalLine::Commit(txid) => write!(f, "COMMIT {txid}"),
            WalLine::Applied(txid) => write!(f, "APPLIED {txid}"),
            WalLine::Action(WalAction::Debit { acc_no, amount }) => {
                write!(f, "DEBIT {acc_no} {amount:.2}")
            }
            WalLine::Action(WalAction::Credit { acc_no, amount }) => {
                write!(f, "CREDIT {acc_no} {amount:.2}")
            }
            WalLine::Action(WalAction::UpdateLoan { loan_id, status }) => {
                write!(f, "UPDATE_LOAN {loan_id} {status}")
            }
        }
    }
}

fn parse_txid(field: Option<&str>, line: &str) -> CoreResult<TxId> {
    field
        .map(TxId::from_token)
        .ok_or_else(|| CoreError::wal_corruption(format!("missing txid in WAL line {line:?}")))
}

fn parse_key(field: Option<&str>, line: &str) -> CoreResult<u32> {
    field
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&k| k > 0)
        .ok_or_else(|| CoreError::wal_corruption(format!("bad record key in WAL line {line:?}")))
}

fn parse_amount(field: Option<&str>, line: &str) -> CoreResult<f64> {
    field
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| CoreError::wal_corruption(format!("bad amount in WAL line {line:?}")))
}

fn parse_status(field: Option<&str>, line: &str) -> CoreResult<LoanStatus> {
    field
        .and_then(|f| f.parse::<LoanStatus>().ok())
        .ok_or_else(|| CoreError::wal_corruption(format!("bad loan status in WAL line {line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_wire_shape() {
        let line = WalLine::Action(WalAction::Credit {
            acc_no: AccountNo::new(2),
            amount: 500.0,
        });
        assert_eq!(line.to_string(), "CREDIT 2 500.00");

        let line = WalLine::Action(WalAction::Debit {
            acc_no: AccountNo::new(1),
            amount: 0.5,
        });
        assert_eq!(line.to_string(), "DEBIT 1 0.50");

        let line = WalLine::Action(WalAction::UpdateLoan {
            loan_id: LoanId::new(3),
            status: LoanStatus::Reviewed,
        });
        assert_eq!(line.to_string(), "UPDATE_LOAN 3 REVIEWED");
    }

    #[test]
    fn parse_round_trip() {
        let txid = TxId::generate();
        let lines = [
            WalLine::Begin(txid.clone()),
            WalLine::Action(WalAction::Debit {
                acc_no: AccountNo::new(1),
                amount: 500.0,
            }),
            WalLine::Action(WalAction::Credit {
                acc_no: AccountNo::new(2),
                amount: 500.0,
            }),
            WalLine::Commit(txid.clone()),
            WalLine::Applied(txid),
        ];

        for line in lines {
            assert_eq!(WalLine::parse(&line.to_string()).unwrap(), line);
        }
    }

    #[test]
    fn parse_rejects_unknown_verb() {
        let err = WalLine::parse("ROLLBACK tx-1-0").unwrap_err();
        assert!(matches!(err, CoreError::WalCorruption { .. }));
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(WalLine::parse("").is_err());
        assert!(WalLine::parse("BEGIN").is_err());
        assert!(WalLine::parse("DEBIT 1").is_err());
        assert!(WalLine::parse("UPDATE_LOAN 1").is_err());
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!(WalLine::parse("DEBIT zero 5.00").is_err());
        assert!(WalLine::parse("DEBIT 0 5.00").is_err());
        assert!(WalLine::parse("CREDIT 1 -5.00").is_err());
        assert!(WalLine::parse("CREDIT 1 NaN").is_err());
        assert!(WalLine::parse("UPDATE_LOAN 1 SHREDDED").is_err());
    }

    #[test]
    fn parse_rejects_trailing_fields() {
        assert!(WalLine::parse("CREDIT 1 5.00 extra").is_err());
    }
}
