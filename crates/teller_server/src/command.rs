//! Per-role command sets.
//!
//! Each role gets a closed set of tagged commands parsed from a single
//! line of the form `VERB arg...`. Every command is parsed in full before
//! the engine is invoked, so no record or log lock is ever held while
//! waiting on client input.

use crate::error::{ServerError, ServerResult};
use teller_core::types::{AccountNo, LoanId, Role};

/// Commands available to a logged-in customer.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerCommand {
    /// `DEPOSIT <amount>` into the customer's own account.
    Deposit(f64),
    /// `WITHDRAW <amount>` from the customer's own account.
    Withdraw(f64),
    /// `TRANSFER <to> <amount>` from the customer's own account.
    Transfer(AccountNo, f64),
    /// `BALANCE` of the customer's own account.
    Balance,
    /// `APPLY_LOAN <amount> <purpose...>`.
    ApplyLoan(f64, String),
    /// `VIEW` the customer's own record.
    View,
    /// `LOGOUT`.
    Logout,
}

/// Commands available to an employee.
#[derive(Debug, Clone, PartialEq)]
pub enum EmployeeCommand {
    /// `VIEW_PENDING` loan applications.
    ViewPending,
    /// `MARK_REVIEW <loan_id>`: PENDING -> REVIEWED.
    MarkReview(LoanId),
    /// `VIEW_ACCOUNT <acc_no>`.
    ViewAccount(AccountNo),
    /// `LOGOUT`.
    Logout,
}

/// Commands available to a manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerCommand {
    /// `LIST_REVIEWED` loans awaiting a decision.
    ListReviewed,
    /// `APPROVE <loan_id>`: REVIEWED -> APPROVED, credits the borrower.
    Approve(LoanId),
    /// `REJECT <loan_id>`: REVIEWED -> REJECTED.
    Reject(LoanId),
    /// `LOGOUT`.
    Logout,
}

/// Commands available to an administrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// `ADD_ACCOUNT <role> <name> <password> <balance>`.
    AddAccount {
        /// Role of the new account.
        role: Role,
        /// Holder name.
        name: String,
        /// Credential blob.
        password: String,
        /// Opening balance.
        balance: f64,
    },
    /// `DEACTIVATE <acc_no>`: soft delete.
    Deactivate(AccountNo),
    /// `VIEW_ACCOUNT <acc_no>`.
    ViewAccount(AccountNo),
    /// `VIEW_ALL` accounts.
    ViewAll,
    /// `LOGOUT`.
    Logout,
}

/// A parsed command, tagged by the role whose grammar accepted it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A customer command.
    Customer(CustomerCommand),
    /// An employee command.
    Employee(EmployeeCommand),
    /// A manager command.
    Manager(ManagerCommand),
    /// An admin command.
    Admin(AdminCommand),
}

impl Command {
    /// Parses one line under the grammar of the given role.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCommand` for unknown verbs, wrong arity, or
    /// unparseable arguments.
    pub fn parse(role: Role, line: &str) -> ServerResult<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| ServerError::InvalidCommand("empty line".into()))?;
        let rest: Vec<&str> = parts.collect();

        match role {
            Role::Customer => parse_customer(verb, &rest).map(Command::Customer),
            Role::Employee => parse_employee(verb, &rest).map(Command::Employee),
            Role::Manager => parse_manager(verb, &rest).map(Command::Manager),
            Role::Admin => parse_admin(verb, &rest).map(Command::Admin),
        }
    }
}

fn parse_customer(verb: &str, args: &[&str]) -> ServerResult<CustomerCommand> {
    match (verb, args) {
        ("DEPOSIT", [amount]) => Ok(CustomerCommand::Deposit(parse_amount(amount)?)),
        ("WITHDRAW", [amount]) => Ok(CustomerCommand::Withdraw(parse_amount(amount)?)),
        ("TRANSFER", [to, amount]) => Ok(CustomerCommand::Transfer(
            AccountNo::new(parse_key(to)?),
            parse_amount(amount)?,
        )),
        ("BALANCE", []) => Ok(CustomerCommand::Balance),
        ("APPLY_LOAN", [amount, purpose @ ..]) if !purpose.is_empty() => Ok(
            CustomerCommand::ApplyLoan(parse_amount(amount)?, purpose.join(" ")),
        ),
        ("VIEW", []) => Ok(CustomerCommand::View),
        ("LOGOUT", []) => Ok(CustomerCommand::Logout),
        _ => Err(unknown(verb)),
    }
}

fn parse_employee(verb: &str, args: &[&str]) -> ServerResult<EmployeeCommand> {
    match (verb, args) {
        ("VIEW_PENDING", []) => Ok(EmployeeCommand::ViewPending),
        ("MARK_REVIEW", [loan]) => Ok(EmployeeCommand::MarkReview(LoanId::new(parse_key(loan)?))),
        ("VIEW_ACCOUNT", [acc]) => {
            Ok(EmployeeCommand::ViewAccount(AccountNo::new(parse_key(acc)?)))
        }
        ("LOGOUT", []) => Ok(EmployeeCommand::Logout),
        _ => Err(unknown(verb)),
    }
}

fn parse_manager(verb: &str, args: &[&str]) -> ServerResult<ManagerCommand> {
    match (verb, args) {
        ("LIST_REVIEWED", []) => Ok(ManagerCommand::ListReviewed),
        ("APPROVE", [loan]) => Ok(ManagerCommand::Approve(LoanId::new(parse_key(loan)?))),
        ("REJECT", [loan]) => Ok(ManagerCommand::Reject(LoanId::new(parse_key(loan)?))),
        ("LOGOUT", []) => Ok(ManagerCommand::Logout),
        _ => Err(unknown(verb)),
    }
}

fn parse_admin(verb: &str, args: &[&str]) -> ServerResult<AdminCommand> {
    match (verb, args) {
        ("ADD_ACCOUNT", [role, name, password, balance]) => Ok(AdminCommand::AddAccount {
            role: role
                .parse::<Role>()
                .map_err(ServerError::InvalidCommand)?,
            name: (*name).to_owned(),
            password: (*password).to_owned(),
            balance: parse_amount(balance)?,
        }),
        ("DEACTIVATE", [acc]) => Ok(AdminCommand::Deactivate(AccountNo::new(parse_key(acc)?))),
        ("VIEW_ACCOUNT", [acc]) => Ok(AdminCommand::ViewAccount(AccountNo::new(parse_key(acc)?))),
        ("VIEW_ALL", []) => Ok(AdminCommand::ViewAll),
        ("LOGOUT", []) => Ok(AdminCommand::Logout),
        _ => Err(unknown(verb)),
    }
}

fn parse_key(field: &str) -> ServerResult<u32> {
    field
        .parse::<u32>()
        .map_err(|_| ServerError::InvalidCommand(format!("bad record key: {field}")))
}

fn parse_amount(field: &str) -> ServerResult<f64> {
    field
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or_else(|| ServerError::InvalidCommand(format!("bad amount: {field}")))
}

fn unknown(verb: &str) -> ServerError {
    ServerError::InvalidCommand(format!("unknown command: {verb}"))
}
