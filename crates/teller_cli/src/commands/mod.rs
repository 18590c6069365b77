//! CLI command implementations.

pub mod accounts;
pub mod seed;
pub mod serve;
pub mod wal;
