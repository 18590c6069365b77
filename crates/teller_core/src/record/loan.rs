//! Loan record layout.

use crate::error::{CoreError, CoreResult};
use crate::record::{decode_fixed_str, encode_fixed_str, Record, RECORD_PADDING};
use crate::types::{AccountNo, LoanId, LoanStatus};

/// Width of the fixed purpose field.
pub const MAX_PURPOSE: usize = 128;

/// On-disk slot size of a loan record.
///
/// loan_id (4) + acc_no (4) + amount (8) + status (4) + purpose (128)
/// + padding (32).
pub const LOAN_RECORD_SIZE: usize = 4 + 4 + 8 + 4 + MAX_PURPOSE + RECORD_PADDING;

/// A loan application record. Never deleted; status only moves forward.
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    /// 1-based loan key.
    pub loan_id: LoanId,
    /// The applying account.
    pub acc_no: AccountNo,
    /// Requested amount.
    pub amount: f64,
    /// Current lifecycle status.
    pub status: LoanStatus,
    /// Free-text purpose.
    pub purpose: String,
}

impl Loan {
    /// Creates a new PENDING loan record.
    #[must_use]
    pub fn new(loan_id: LoanId, acc_no: AccountNo, amount: f64, purpose: impl Into<String>) -> Self {
        Self {
            loan_id,
            acc_no,
            amount,
            status: LoanStatus::Pending,
            purpose: purpose.into(),
        }
    }
}

impl Record for Loan {
    const SIZE: usize = LOAN_RECORD_SIZE;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&(self.loan_id.as_u32() as i32).to_le_bytes());
        buf.extend_from_slice(&(self.acc_no.as_u32() as i32).to_le_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.status.as_i32().to_le_bytes());
        encode_fixed_str(&mut buf, &self.purpose, MAX_PURPOSE);
        buf.resize(Self::SIZE, 0);
        buf
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CoreError::corrupt_record(format!(
                "loan slot is {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }

        let loan_id = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let acc_no = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let amount = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let status_tag = i32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let purpose = decode_fixed_str(&bytes[20..20 + MAX_PURPOSE]);

        if loan_id <= 0 || acc_no <= 0 {
            return Err(CoreError::corrupt_record(format!(
                "loan slot holds non-positive keys loan_id={loan_id} acc_no={acc_no}"
            )));
        }
        let status = LoanStatus::from_i32(status_tag).ok_or_else(|| {
            CoreError::corrupt_record(format!("unknown loan status tag {status_tag}"))
        })?;
        if !amount.is_finite() {
            return Err(CoreError::corrupt_record("non-finite loan amount"));
        }

        Ok(Self {
            loan_id: LoanId::new(loan_id as u32),
            acc_no: AccountNo::new(acc_no as u32),
            amount,
            status,
            purpose,
        })
    }
}
