//! Fixed-size record layouts and codecs.
//!
//! Both record kinds occupy fixed-width slots so that slot offsets can be
//! computed arithmetically from the key (`offset = (key - 1) * SIZE`).
//! Growing a field is a file migration, never an in-place schema change.

mod account;
mod loan;

pub use account::{Account, ACCOUNT_RECORD_SIZE, MAX_NAME, MAX_PASS};
pub use loan::{Loan, LOAN_RECORD_SIZE, MAX_PURPOSE};

use crate::error::CoreResult;

/// Reserved tail bytes on every record slot.
pub(crate) const RECORD_PADDING: usize = 32;

/// A fixed-size record that can live in a [`crate::store::RecordFile`].
pub trait Record: Sized + Send {
    /// Slot size in bytes. Every encoded record is exactly this long.
    const SIZE: usize;

    /// Encodes the record into exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decodes a record from a full slot.
    ///
    /// # Errors
    ///
    /// Returns `CorruptRecord` if the slot is the wrong size or holds
    /// out-of-range field values.
    fn decode(bytes: &[u8]) -> CoreResult<Self>;
}

/// Writes `text` into a fixed-width field, NUL-padded, truncating on overflow.
pub(crate) fn encode_fixed_str(buf: &mut Vec<u8>, text: &str, width: usize) {
    let bytes = text.as_bytes();
    let take = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..take]);
    buf.resize(buf.len() + (width - take), 0);
}

/// Reads a fixed-width field back into a string, stopping at the first NUL.
pub(crate) fn decode_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
