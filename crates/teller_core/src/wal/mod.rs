//! Write-ahead log.
//!
//! An append-only text log of transaction intents. Each logical entry is
//! one ASCII line; a transaction is the bracket `BEGIN <txid>` ...
//! `COMMIT <txid>` with zero or more action lines between. A transaction
//! is durable and applicable only once its COMMIT line is present.
//!
//! An extra `APPLIED <txid>` marker line is appended after the engine
//! finishes applying a committed transaction to the record store; replay
//! skips marked transactions so a crash between COMMIT and apply is
//! replayed exactly once and never double-applied.

mod line;
mod writer;

pub use line::{WalAction, WalLine};
pub use writer::WalWriter;
