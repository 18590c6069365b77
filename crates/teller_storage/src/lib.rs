//! # Teller Storage
//!
//! Storage backend trait and implementations for Teller.
//!
//! This crate provides the lowest-level storage abstraction for the ledger.
//! Storage backends are **opaque byte stores** - they do not interpret the
//! data they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, write, append, sync)
//! - No knowledge of record layouts or the WAL line format
//! - Must be `Send + Sync` for concurrent access
//! - `teller_core` owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral ledgers
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use teller_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(0, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
