//! Account record layout.

use crate::error::{CoreError, CoreResult};
use crate::record::{decode_fixed_str, encode_fixed_str, Record, RECORD_PADDING};
use crate::types::{AccountNo, Role};

/// Width of the fixed name field.
pub const MAX_NAME: usize = 64;

/// Width of the fixed password field.
pub const MAX_PASS: usize = 32;

/// On-disk slot size of an account record.
///
/// acc_no (4) + role (4) + name (64) + password (32) + balance (8)
/// + active (4) + padding (32).
pub const ACCOUNT_RECORD_SIZE: usize = 4 + 4 + MAX_NAME + MAX_PASS + 8 + 4 + RECORD_PADDING;

/// An account record.
///
/// The password field is an opaque credential blob; securing it is out of
/// scope for the storage layer. Accounts are soft-deleted by clearing the
/// `active` flag and are never physically removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// 1-based account key.
    pub acc_no: AccountNo,
    /// Role tag.
    pub role: Role,
    /// Holder name.
    pub name: String,
    /// Credential blob.
    pub password: String,
    /// Current balance. Never driven negative by the engine.
    pub balance: f64,
    /// Soft-delete flag.
    pub active: bool,
}

impl Account {
    /// Creates a new active account record.
    #[must_use]
    pub fn new(
        acc_no: AccountNo,
        role: Role,
        name: impl Into<String>,
        password: impl Into<String>,
        balance: f64,
    ) -> Self {
        Self {
            acc_no,
            role,
            name: name.into(),
            password: password.into(),
            balance,
            active: true,
        }
    }
}

impl Record for Account {
    const SIZE: usize = ACCOUNT_RECORD_SIZE;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&(self.acc_no.as_u32() as i32).to_le_bytes());
        buf.extend_from_slice(&self.role.as_i32().to_le_bytes());
        encode_fixed_str(&mut buf, &self.name, MAX_NAME);
        encode_fixed_str(&mut buf, &self.password, MAX_PASS);
        buf.extend_from_slice(&self.balance.to_le_bytes());
        buf.extend_from_slice(&i32::from(self.active).to_le_bytes());
        buf.resize(Self::SIZE, 0);
        buf
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CoreError::corrupt_record(format!(
                "account slot is {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }

        let acc_no = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let role_tag = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let name = decode_fixed_str(&bytes[8..8 + MAX_NAME]);
        let password = decode_fixed_str(&bytes[72..72 + MAX_PASS]);
        let balance = f64::from_le_bytes(bytes[104..112].try_into().unwrap());
        let active = i32::from_le_bytes(bytes[112..116].try_into().unwrap());

        if acc_no <= 0 {
            return Err(CoreError::corrupt_record(format!(
                "account slot holds non-positive key {acc_no}"
            )));
        }
        let role = Role::from_i32(role_tag)
            .ok_or_else(|| CoreError::corrupt_record(format!("unknown role tag {role_tag}")))?;
        if !balance.is_finite() {
            return Err(CoreError::corrupt_record("non-finite balance"));
        }

        Ok(Self {
            acc_no: AccountNo::new(acc_no as u32),
            role,
            name,
            password,
            balance,
            active: active != 0,
        })
    }
}
