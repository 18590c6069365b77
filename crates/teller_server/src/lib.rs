//! # Teller Server
//!
//! Line-framed TCP session layer over the teller ledger engine.
//!
//! Each connection runs a login exchange and then a command loop whose
//! grammar is closed per role: customers move money, employees review
//! loan applications, managers decide them, admins manage accounts. One
//! shared [`teller_core::Ledger`] backs every session.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use command::Command;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::Server;
pub use session::Session;
