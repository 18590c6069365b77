//! # Teller Core
//!
//! Transactional ledger engine for Teller.
//!
//! This crate provides:
//! - Fixed-slot record files for accounts and loans
//! - A per-record lock table serializing concurrent mutation
//! - A text write-ahead log of transaction intents
//! - A transaction engine for deposits, withdrawals, transfers, and the
//!   loan lifecycle
//! - Startup recovery that replays committed-but-unapplied transactions

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dir;
pub mod engine;
pub mod error;
pub mod lock;
pub mod ledger;
pub mod record;
pub mod recovery;
pub mod store;
pub mod types;
pub mod wal;

pub use engine::TransactionEngine;
pub use error::{CoreError, CoreResult};
pub use ledger::Ledger;
pub use record::{Account, Loan};
pub use recovery::ReplayStats;
pub use types::{AccountNo, LoanId, LoanStatus, Role, TxId};
