//! Core type definitions for Teller.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Key of an account record.
///
/// Account keys are 1-based and dense: the next free key is derived from
/// the account file length, so keys are never reused or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountNo(pub u32);

impl AccountNo {
    /// Creates a new account key.
    #[must_use]
    pub const fn new(no: u32) -> Self {
        Self(no)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AccountNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a loan record, 1-based and dense like [`AccountNo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoanId(pub u32);

impl LoanId {
    /// Creates a new loan key.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-local distinguishing counter for [`TxId`].
static TXID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Transaction identifier used for WAL correlation.
///
/// Time-derived and monotonically distinguishing within a process. Used
/// only for log readability and the replay bookkeeping of recovery, never
/// for concurrency control.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(String);

impl TxId {
    /// Generates a fresh transaction identifier.
    #[must_use]
    pub fn generate() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let seq = TXID_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("tx-{micros}-{seq}"))
    }

    /// Wraps a token read back from the WAL.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self(token.to_owned())
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role tag stored on an account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Regular account holder.
    Customer,
    /// Bank employee: reviews loan applications.
    Employee,
    /// Bank manager: approves or rejects reviewed loans.
    Manager,
    /// Administrator: manages accounts.
    Admin,
}

impl Role {
    /// Returns the on-disk tag value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Role::Customer => 1,
            Role::Employee => 2,
            Role::Manager => 3,
            Role::Admin => 9,
        }
    }

    /// Decodes an on-disk tag value.
    #[must_use]
    pub const fn from_i32(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Role::Customer),
            2 => Some(Role::Employee),
            3 => Some(Role::Manager),
            9 => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Customer => "CUSTOMER",
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "EMPLOYEE" => Ok(Role::Employee),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Status of a loan application.
///
/// Transitions are monotonic along PENDING -> REVIEWED -> APPROVED|REJECTED.
/// No transition skips REVIEWED; APPROVED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoanStatus {
    /// Applied for, not yet reviewed.
    Pending,
    /// Reviewed by an employee, awaiting a manager decision.
    Reviewed,
    /// Approved by a manager. Terminal.
    Approved,
    /// Rejected by a manager. Terminal.
    Rejected,
}

impl LoanStatus {
    /// Returns the on-disk tag value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            LoanStatus::Pending => 0,
            LoanStatus::Reviewed => 1,
            LoanStatus::Approved => 2,
            LoanStatus::Rejected => 3,
        }
    }

    /// Decodes an on-disk tag value.
    #[must_use]
    pub const fn from_i32(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(LoanStatus::Pending),
            1 => Some(LoanStatus::Reviewed),
            2 => Some(LoanStatus::Approved),
            3 => Some(LoanStatus::Rejected),
            _ => None,
        }
    }

    /// Returns true for APPROVED and REJECTED.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Rejected)
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Reviewed)
                | (LoanStatus::Reviewed, LoanStatus::Approved)
                | (LoanStatus::Reviewed, LoanStatus::Rejected)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Reviewed => "REVIEWED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(LoanStatus::Pending),
            "REVIEWED" => Ok(LoanStatus::Reviewed),
            "APPROVED" => Ok(LoanStatus::Approved),
            "REJECTED" => Ok(LoanStatus::Rejected),
            other => Err(format!("unknown loan status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_no_ordering() {
        assert!(AccountNo::new(1) < AccountNo::new(2));
    }

    #[test]
    fn txid_is_distinguishing() {
        let a = TxId::generate();
        let b = TxId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn txid_token_round_trip() {
        let id = TxId::generate();
        assert_eq!(TxId::from_token(id.as_str()), id);
    }

    #[test]
    fn role_tags_round_trip() {
        for role in [Role::Customer, Role::Employee, Role::Manager, Role::Admin] {
            assert_eq!(Role::from_i32(role.as_i32()), Some(role));
        }
        assert_eq!(Role::from_i32(7), None);
    }

    #[test]
    fn role_parse() {
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert!("TELLER".parse::<Role>().is_err());
    }

    #[test]
    fn loan_status_tags_round_trip() {
        for status in [
            LoanStatus::Pending,
            LoanStatus::Reviewed,
            LoanStatus::Approved,
            LoanStatus::Rejected,
        ] {
            assert_eq!(LoanStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(LoanStatus::from_i32(4), None);
    }

    #[test]
    fn loan_transitions_are_monotonic() {
        use LoanStatus::*;
        assert!(Pending.can_transition_to(Reviewed));
        assert!(Reviewed.can_transition_to(Approved));
        assert!(Reviewed.can_transition_to(Rejected));

        // Skipping REVIEWED is illegal, as is leaving a terminal state.
        assert!(!Pending.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Reviewed));
        assert!(!Reviewed.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(LoanStatus::Approved.is_terminal());
        assert!(LoanStatus::Rejected.is_terminal());
        assert!(!LoanStatus::Pending.is_terminal());
        assert!(!LoanStatus::Reviewed.is_terminal());
    }
}
