//! Transaction engine.
//!
//! Composes the lock table, the WAL, and the record files into operations
//! that are atomic from the caller's point of view. Every mutation follows
//! the same skeleton:
//!
//! 1. acquire the record lock(s)
//! 2. validate under the lock, before anything is logged
//! 3. append the whole BEGIN..COMMIT bracket to the WAL (synced)
//! 4. apply the actions to the record store (each write synced)
//! 5. append the APPLIED marker
//! 6. release the lock(s)
//!
//! Business-rule rejections happen in step 2, so a rejected operation
//! leaves no trace in the WAL. I/O failures propagate with `?`; lock
//! guards drop on every path, so no error leaves a lock held.

use crate::error::{CoreError, CoreResult};
use crate::lock::{LockMode, LockTable, RecordKind};
use crate::record::{Account, Loan};
use crate::store::RecordFile;
use crate::types::{AccountNo, LoanId, LoanStatus, Role, TxId};
use crate::wal::{WalAction, WalWriter};
use tracing::debug;

/// The transaction engine.
///
/// Owns the account file, the loan file, the WAL, and the lock table.
/// All mutation of the ledger's on-disk state goes through this type;
/// nothing else holds the file handles.
pub struct TransactionEngine {
    accounts: RecordFile<Account>,
    loans: RecordFile<Loan>,
    wal: WalWriter,
    locks: LockTable,
}

impl TransactionEngine {
    /// Creates an engine over already-recovered record files.
    pub fn new(accounts: RecordFile<Account>, loans: RecordFile<Loan>, wal: WalWriter) -> Self {
        Self {
            accounts,
            loans,
            wal,
            locks: LockTable::new(),
        }
    }

    // ------------------------------------------------------------------
    // Balance operations
    // ------------------------------------------------------------------

    /// Deposits `amount` into an account. Returns the new balance.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `AccountNotFound`, `Inactive`, or an I/O error.
    pub fn deposit(&self, acc_no: AccountNo, amount: f64) -> CoreResult<f64> {
        validate_amount(amount)?;

        let _guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Exclusive);
        let mut account = self.read_active(acc_no)?;

        let txid = TxId::generate();
        self.wal
            .log_transaction(&txid, &[WalAction::Credit { acc_no, amount }])?;

        account.balance += amount;
        self.accounts.write(acc_no.as_u32(), &account)?;
        self.wal.mark_applied(&txid)?;

        debug!(%txid, %acc_no, amount, balance = account.balance, "deposit applied");
        Ok(account.balance)
    }

    /// Withdraws `amount` from an account. Returns the new balance.
    ///
    /// The funds check runs under the held lock and before any WAL line is
    /// written, so rejected withdrawals never pollute the log.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `AccountNotFound`, `Inactive`,
    /// `InsufficientFunds`, or an I/O error.
    pub fn withdraw(&self, acc_no: AccountNo, amount: f64) -> CoreResult<f64> {
        validate_amount(amount)?;

        let _guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Exclusive);
        let mut account = self.read_active(acc_no)?;

        if account.balance < amount {
            return Err(CoreError::InsufficientFunds {
                acc_no,
                balance: account.balance,
                requested: amount,
            });
        }

        let txid = TxId::generate();
        self.wal
            .log_transaction(&txid, &[WalAction::Debit { acc_no, amount }])?;

        account.balance -= amount;
        self.accounts.write(acc_no.as_u32(), &account)?;
        self.wal.mark_applied(&txid)?;

        debug!(%txid, %acc_no, amount, balance = account.balance, "withdrawal applied");
        Ok(account.balance)
    }

    /// Transfers `amount` between two accounts. Returns the resulting
    /// `(from, to)` balances.
    ///
    /// Both records are locked in ascending key order whatever the
    /// from/to direction, and both writes complete before either lock is
    /// released, so no observer holding a conflicting lock can see the
    /// transfer half-applied.
    ///
    /// # Errors
    ///
    /// `TransferToSelf`, `InvalidAmount`, `AccountNotFound`, `Inactive`,
    /// `InsufficientFunds`, or an I/O error.
    pub fn transfer(&self, from: AccountNo, to: AccountNo, amount: f64) -> CoreResult<(f64, f64)> {
        if from == to {
            return Err(CoreError::TransferToSelf { acc_no: from });
        }
        validate_amount(amount)?;

        let (_from_guard, _to_guard) = self.locks.acquire_pair(
            RecordKind::Accounts,
            from.as_u32(),
            to.as_u32(),
            LockMode::Exclusive,
        );

        let mut source = self.read_active(from)?;
        let mut target = self.read_active(to)?;

        if source.balance < amount {
            return Err(CoreError::InsufficientFunds {
                acc_no: from,
                balance: source.balance,
                requested: amount,
            });
        }

        let txid = TxId::generate();
        self.wal.log_transaction(
            &txid,
            &[
                WalAction::Debit {
                    acc_no: from,
                    amount,
                },
                WalAction::Credit { acc_no: to, amount },
            ],
        )?;

        source.balance -= amount;
        target.balance += amount;
        self.accounts.write(from.as_u32(), &source)?;
        self.accounts.write(to.as_u32(), &target)?;
        self.wal.mark_applied(&txid)?;

        debug!(%txid, %from, %to, amount, "transfer applied");
        Ok((source.balance, target.balance))
    }

    // ------------------------------------------------------------------
    // Loan operations
    // ------------------------------------------------------------------

    /// Files a new loan application with status PENDING and returns its key.
    ///
    /// Not WAL-logged: the application has no balance effect; the record
    /// append itself is synced and the key is derived from file length,
    /// so a crash loses at most the not-yet-acknowledged application.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `AccountNotFound`, `Inactive`, or an I/O error.
    pub fn apply_loan(
        &self,
        acc_no: AccountNo,
        amount: f64,
        purpose: &str,
    ) -> CoreResult<LoanId> {
        validate_amount(amount)?;

        let _guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Shared);
        self.read_active(acc_no)?;

        let key = self
            .loans
            .append_with(|k| Loan::new(LoanId::new(k), acc_no, amount, purpose))?;

        debug!(%acc_no, loan_id = key, amount, "loan application filed");
        Ok(LoanId::new(key))
    }

    /// Moves a loan to a new status.
    ///
    /// Transitions must follow PENDING -> REVIEWED -> APPROVED|REJECTED;
    /// anything else is rejected before logging.
    ///
    /// # Errors
    ///
    /// `LoanNotFound`, `InvalidTransition`, or an I/O error.
    pub fn update_loan_status(&self, loan_id: LoanId, status: LoanStatus) -> CoreResult<()> {
        let _guard = self
            .locks
            .acquire(RecordKind::Loans, loan_id.as_u32(), LockMode::Exclusive);
        let mut loan = self
            .loans
            .read(loan_id.as_u32())?
            .ok_or(CoreError::LoanNotFound { loan_id })?;

        if !loan.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                loan_id,
                from: loan.status,
                to: status,
            });
        }

        let txid = TxId::generate();
        self.wal
            .log_transaction(&txid, &[WalAction::UpdateLoan { loan_id, status }])?;

        loan.status = status;
        self.loans.write(loan_id.as_u32(), &loan)?;
        self.wal.mark_applied(&txid)?;

        debug!(%txid, %loan_id, %status, "loan status applied");
        Ok(())
    }

    /// Approves a reviewed loan and credits its amount to the borrower,
    /// in one transaction bracket. Returns the borrower's new balance.
    ///
    /// Lock order is loan first, then account; this is the only operation
    /// taking locks of both kinds, so the cross-kind order cannot cycle.
    ///
    /// # Errors
    ///
    /// `LoanNotFound`, `InvalidTransition` if the loan is not REVIEWED,
    /// `AccountNotFound`/`Inactive` for the borrower, or an I/O error.
    pub fn approve_loan(&self, loan_id: LoanId) -> CoreResult<f64> {
        let _loan_guard = self
            .locks
            .acquire(RecordKind::Loans, loan_id.as_u32(), LockMode::Exclusive);
        let mut loan = self
            .loans
            .read(loan_id.as_u32())?
            .ok_or(CoreError::LoanNotFound { loan_id })?;

        if !loan.status.can_transition_to(LoanStatus::Approved) {
            return Err(CoreError::InvalidTransition {
                loan_id,
                from: loan.status,
                to: LoanStatus::Approved,
            });
        }

        let acc_no = loan.acc_no;
        let amount = loan.amount;
        let _acc_guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Exclusive);
        let mut account = self.read_active(acc_no)?;

        let txid = TxId::generate();
        self.wal.log_transaction(
            &txid,
            &[
                WalAction::UpdateLoan {
                    loan_id,
                    status: LoanStatus::Approved,
                },
                WalAction::Credit { acc_no, amount },
            ],
        )?;

        loan.status = LoanStatus::Approved;
        account.balance += amount;
        self.loans.write(loan_id.as_u32(), &loan)?;
        self.accounts.write(acc_no.as_u32(), &account)?;
        self.wal.mark_applied(&txid)?;

        debug!(%txid, %loan_id, %acc_no, amount, "loan approved and credited");
        Ok(account.balance)
    }

    // ------------------------------------------------------------------
    // Account administration
    // ------------------------------------------------------------------

    /// Creates an account at the next free key and returns it.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a negative or non-finite opening balance, or
    /// an I/O error.
    pub fn add_account(
        &self,
        role: Role,
        name: &str,
        password: &str,
        opening_balance: f64,
    ) -> CoreResult<AccountNo> {
        if !opening_balance.is_finite() || opening_balance < 0.0 {
            return Err(CoreError::InvalidAmount {
                amount: opening_balance,
            });
        }

        let key = self.accounts.append_with(|k| {
            Account::new(AccountNo::new(k), role, name, password, opening_balance)
        })?;

        debug!(acc_no = key, %role, "account created");
        Ok(AccountNo::new(key))
    }

    /// Soft-deletes an account: flips `active` off, never shrinks the file.
    ///
    /// # Errors
    ///
    /// `AccountNotFound`, `Inactive` if already deactivated, or an I/O error.
    pub fn deactivate_account(&self, acc_no: AccountNo) -> CoreResult<()> {
        let _guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Exclusive);
        let mut account = self.read_active(acc_no)?;

        account.active = false;
        self.accounts.write(acc_no.as_u32(), &account)?;

        debug!(%acc_no, "account deactivated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads an account under a shared lock. Inactive accounts are
    /// returned too; callers that need an active one use the mutation ops.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or an I/O error.
    pub fn account(&self, acc_no: AccountNo) -> CoreResult<Account> {
        let _guard = self
            .locks
            .acquire(RecordKind::Accounts, acc_no.as_u32(), LockMode::Shared);
        self.accounts
            .read(acc_no.as_u32())?
            .ok_or(CoreError::AccountNotFound { acc_no })
    }

    /// Reads an account balance under a shared lock.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or an I/O error.
    pub fn balance(&self, acc_no: AccountNo) -> CoreResult<f64> {
        Ok(self.account(acc_no)?.balance)
    }

    /// Reads a loan under a shared lock.
    ///
    /// # Errors
    ///
    /// `LoanNotFound` or an I/O error.
    pub fn loan(&self, loan_id: LoanId) -> CoreResult<Loan> {
        let _guard = self
            .locks
            .acquire(RecordKind::Loans, loan_id.as_u32(), LockMode::Shared);
        self.loans
            .read(loan_id.as_u32())?
            .ok_or(CoreError::LoanNotFound { loan_id })
    }

    /// Lists every account record in key order.
    pub fn accounts(&self) -> CoreResult<Vec<Account>> {
        self.accounts.scan()
    }

    /// Lists loans currently in the given status.
    pub fn loans_with_status(&self, status: LoanStatus) -> CoreResult<Vec<Loan>> {
        Ok(self
            .loans
            .scan()?
            .into_iter()
            .filter(|l| l.status == status)
            .collect())
    }

    /// Reads the raw WAL lines, for tooling.
    pub fn wal_lines(&self) -> CoreResult<Vec<String>> {
        self.wal.lines()
    }

    fn read_active(&self, acc_no: AccountNo) -> CoreResult<Account> {
        let account = self
            .accounts
            .read(acc_no.as_u32())?
            .ok_or(CoreError::AccountNotFound { acc_no })?;
        if !account.active {
            return Err(CoreError::Inactive { acc_no });
        }
        Ok(account)
    }
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine").finish_non_exhaustive()
    }
}

fn validate_amount(amount: f64) -> CoreResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_storage::InMemoryBackend;

    fn engine() -> TransactionEngine {
        let engine = TransactionEngine::new(
            RecordFile::new(Box::new(InMemoryBackend::new())),
            RecordFile::new(Box::new(InMemoryBackend::new())),
            WalWriter::new(Box::new(InMemoryBackend::new())),
        );
        engine
            .add_account(Role::Customer, "cust101", "pass101", 1500.0)
            .unwrap();
        engine
            .add_account(Role::Customer, "cust102", "pass102", 3000.0)
            .unwrap();
        engine
    }

    #[test]
    fn deposit_credits_and_logs() {
        let engine = engine();

        let balance = engine.deposit(AccountNo::new(2), 500.0).unwrap();
        assert_eq!(balance, 3500.0);
        assert_eq!(engine.balance(AccountNo::new(2)).unwrap(), 3500.0);

        let lines = engine.wal_lines().unwrap();
        assert!(lines[0].starts_with("BEGIN "));
        assert_eq!(lines[1], "CREDIT 2 500.00");
        assert!(lines[2].starts_with("COMMIT "));
        assert!(lines[3].starts_with("APPLIED "));
    }

    #[test]
    fn deposit_rejects_missing_account() {
        let engine = engine();
        let err = engine.deposit(AccountNo::new(99), 10.0).unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound { .. }));
        // Zero is a synthetic "no such key", never a panic.
        let err = engine.deposit(AccountNo::new(0), 10.0).unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound { .. }));
    }

    #[test]
    fn deposit_rejects_bad_amounts() {
        let engine = engine();
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = engine.deposit(AccountNo::new(1), amount).unwrap_err();
            assert!(matches!(err, CoreError::InvalidAmount { .. }));
        }
        assert!(engine.wal_lines().unwrap().is_empty());
    }

    #[test]
    fn withdraw_insufficient_funds_leaves_no_wal_lines() {
        let engine = engine();

        let err = engine.withdraw(AccountNo::new(1), 2000.0).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert_eq!(engine.balance(AccountNo::new(1)).unwrap(), 1500.0);
        assert!(engine.wal_lines().unwrap().is_empty());
    }

    #[test]
    fn withdraw_debits_balance() {
        let engine = engine();
        let balance = engine.withdraw(AccountNo::new(1), 500.0).unwrap();
        assert_eq!(balance, 1000.0);
    }

    #[test]
    fn inactive_account_accepts_no_mutation() {
        let engine = engine();
        engine.deactivate_account(AccountNo::new(1)).unwrap();

        let err = engine.deposit(AccountNo::new(1), 10.0).unwrap_err();
        assert!(matches!(err, CoreError::Inactive { .. }));
        let err = engine.withdraw(AccountNo::new(1), 10.0).unwrap_err();
        assert!(matches!(err, CoreError::Inactive { .. }));
        let err = engine.deactivate_account(AccountNo::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::Inactive { .. }));

        // The record is still there: soft delete, not removal.
        assert!(!engine.account(AccountNo::new(1)).unwrap().active);
    }

    #[test]
    fn transfer_moves_funds_in_one_bracket() {
        let engine = engine();

        let (from, to) = engine
            .transfer(AccountNo::new(1), AccountNo::new(2), 500.0)
            .unwrap();
        assert_eq!(from, 1000.0);
        assert_eq!(to, 3500.0);

        let lines = engine.wal_lines().unwrap();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("BEGIN "));
        assert_eq!(lines[1], "DEBIT 1 500.00");
        assert_eq!(lines[2], "CREDIT 2 500.00");
        assert!(lines[3].starts_with("COMMIT "));
    }

    #[test]
    fn transfer_rejects_self() {
        let engine = engine();
        let err = engine
            .transfer(AccountNo::new(1), AccountNo::new(1), 10.0)
            .unwrap_err();
        assert!(matches!(err, CoreError::TransferToSelf { .. }));
    }

    #[test]
    fn transfer_rejects_missing_or_inactive_peer() {
        let engine = engine();

        let err = engine
            .transfer(AccountNo::new(1), AccountNo::new(42), 10.0)
            .unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound { .. }));

        engine.deactivate_account(AccountNo::new(2)).unwrap();
        let err = engine
            .transfer(AccountNo::new(1), AccountNo::new(2), 10.0)
            .unwrap_err();
        assert!(matches!(err, CoreError::Inactive { .. }));
        assert!(engine.wal_lines().unwrap().is_empty());
    }

    #[test]
    fn transfer_is_zero_sum() {
        let engine = engine();
        let before = engine.balance(AccountNo::new(1)).unwrap()
            + engine.balance(AccountNo::new(2)).unwrap();

        engine
            .transfer(AccountNo::new(2), AccountNo::new(1), 750.0)
            .unwrap();

        let after = engine.balance(AccountNo::new(1)).unwrap()
            + engine.balance(AccountNo::new(2)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn loan_lifecycle() {
        let engine = engine();

        let loan_id = engine
            .apply_loan(AccountNo::new(1), 1000.0, "home")
            .unwrap();
        assert_eq!(loan_id, LoanId::new(1));
        assert_eq!(engine.loan(loan_id).unwrap().status, LoanStatus::Pending);

        engine
            .update_loan_status(loan_id, LoanStatus::Reviewed)
            .unwrap();
        assert_eq!(engine.loan(loan_id).unwrap().status, LoanStatus::Reviewed);

        engine
            .update_loan_status(loan_id, LoanStatus::Approved)
            .unwrap();
        assert_eq!(engine.loan(loan_id).unwrap().status, LoanStatus::Approved);
    }

    #[test]
    fn loan_transitions_cannot_skip_or_go_back() {
        let engine = engine();
        let loan_id = engine.apply_loan(AccountNo::new(1), 500.0, "car").unwrap();

        // PENDING cannot jump straight to a terminal state.
        let err = engine
            .update_loan_status(loan_id, LoanStatus::Approved)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        engine
            .update_loan_status(loan_id, LoanStatus::Reviewed)
            .unwrap();
        engine
            .update_loan_status(loan_id, LoanStatus::Rejected)
            .unwrap();

        // Terminal states are immutable.
        let err = engine
            .update_loan_status(loan_id, LoanStatus::Reviewed)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn loan_for_missing_account_is_rejected() {
        let engine = engine();
        let err = engine
            .apply_loan(AccountNo::new(77), 100.0, "boat")
            .unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound { .. }));
    }

    #[test]
    fn approve_loan_credits_borrower_in_one_bracket() {
        let engine = engine();
        let loan_id = engine
            .apply_loan(AccountNo::new(1), 1000.0, "home")
            .unwrap();
        engine
            .update_loan_status(loan_id, LoanStatus::Reviewed)
            .unwrap();

        let balance = engine.approve_loan(loan_id).unwrap();
        assert_eq!(balance, 2500.0);
        assert_eq!(engine.loan(loan_id).unwrap().status, LoanStatus::Approved);

        let lines = engine.wal_lines().unwrap();
        // Last bracket: BEGIN, UPDATE_LOAN, CREDIT, COMMIT, APPLIED.
        let n = lines.len();
        assert_eq!(lines[n - 4], "UPDATE_LOAN 1 APPROVED");
        assert_eq!(lines[n - 3], "CREDIT 1 1000.00");
        assert!(lines[n - 1].starts_with("APPLIED "));
    }

    #[test]
    fn approve_requires_reviewed() {
        let engine = engine();
        let loan_id = engine.apply_loan(AccountNo::new(1), 100.0, "tv").unwrap();

        let err = engine.approve_loan(loan_id).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn update_missing_loan_is_not_found() {
        let engine = engine();
        let err = engine
            .update_loan_status(LoanId::new(9), LoanStatus::Reviewed)
            .unwrap_err();
        assert!(matches!(err, CoreError::LoanNotFound { .. }));
    }

    #[test]
    fn listings_filter_by_status() {
        let engine = engine();
        let l1 = engine.apply_loan(AccountNo::new(1), 100.0, "a").unwrap();
        let _l2 = engine.apply_loan(AccountNo::new(2), 200.0, "b").unwrap();
        engine.update_loan_status(l1, LoanStatus::Reviewed).unwrap();

        assert_eq!(
            engine.loans_with_status(LoanStatus::Pending).unwrap().len(),
            1
        );
        assert_eq!(
            engine
                .loans_with_status(LoanStatus::Reviewed)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(engine.accounts().unwrap().len(), 2);
    }

    #[test]
    fn no_balance_goes_negative() {
        let engine = engine();

        // Drain account 1 exactly, then every further debit is rejected.
        engine.withdraw(AccountNo::new(1), 1500.0).unwrap();
        assert!(engine.withdraw(AccountNo::new(1), 0.01).is_err());
        assert!(engine
            .transfer(AccountNo::new(1), AccountNo::new(2), 0.01)
            .is_err());

        for account in engine.accounts().unwrap() {
            assert!(account.balance >= 0.0);
        }
    }
}
