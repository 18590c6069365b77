//! Error types for the Teller core.

use crate::types::{AccountNo, LoanId, LoanStatus};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Teller core operations.
///
/// Business-rule rejections (`AccountNotFound`, `Inactive`,
/// `InsufficientFunds`, ...) are recoverable per-operation outcomes and are
/// reported to the caller before anything is written to the WAL. I/O and
/// corruption variants abort the single operation that hit them; held locks
/// are released on every error path.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] teller_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Account key absent or beyond the current file extent.
    #[error("account not found: {acc_no}")]
    AccountNotFound {
        /// The account key that was looked up.
        acc_no: AccountNo,
    },

    /// Loan key absent or beyond the current file extent.
    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        /// The loan key that was looked up.
        loan_id: LoanId,
    },

    /// Account was soft-deleted and accepts no further mutation.
    #[error("account inactive: {acc_no}")]
    Inactive {
        /// The deactivated account.
        acc_no: AccountNo,
    },

    /// Withdrawal or transfer exceeds the available balance.
    #[error("insufficient funds on account {acc_no}: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds {
        /// The debited account.
        acc_no: AccountNo,
        /// The balance at the time of the check.
        balance: f64,
        /// The amount requested.
        requested: f64,
    },

    /// Amount is zero, negative, or not a finite number.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: f64,
    },

    /// Transfer names the same account on both sides.
    #[error("cannot transfer from account {acc_no} to itself")]
    TransferToSelf {
        /// The account named on both sides.
        acc_no: AccountNo,
    },

    /// Loan status change violates the PENDING -> REVIEWED -> APPROVED|REJECTED order.
    #[error("invalid loan transition on {loan_id}: {from} -> {to}")]
    InvalidTransition {
        /// The loan being updated.
        loan_id: LoanId,
        /// The status on disk.
        from: LoanStatus,
        /// The requested status.
        to: LoanStatus,
    },

    /// A record slot decoded to garbage.
    #[error("corrupt record: {message}")]
    CorruptRecord {
        /// Description of the corruption.
        message: String,
    },

    /// A WAL line could not be parsed.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the data directory lock.
    #[error("ledger locked: another process has exclusive access")]
    LedgerLocked,
}

impl CoreError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Returns true if this is a business-rule rejection rather than a
    /// storage or environment failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::AccountNotFound { .. }
                | CoreError::LoanNotFound { .. }
                | CoreError::Inactive { .. }
                | CoreError::InsufficientFunds { .. }
                | CoreError::InvalidAmount { .. }
                | CoreError::TransferToSelf { .. }
                | CoreError::InvalidTransition { .. }
        )
    }
}
