//! One client session over a line-framed stream.
//!
//! Protocol, one line per message:
//!
//! ```text
//! S: ROLE?
//! C: CUSTOMER
//! S: LOGIN?
//! C: LOGIN 1 pass101
//! S: OK 1 CUSTOMER cust101
//! C: DEPOSIT 500
//! S: OK 2000.00
//! ```
//!
//! Replies are `OK ...` or `ERR <CODE> <detail>`. Listings are one line
//! per record followed by `END`. Commands are parsed in full before the
//! engine runs, and every engine call happens on the blocking pool, so a
//! slow client can never pin a record lock.

use crate::command::{AdminCommand, Command, CustomerCommand, EmployeeCommand, ManagerCommand};
use crate::error::{ServerError, ServerResult};
use std::sync::Arc;
use teller_core::record::{Account, Loan};
use teller_core::types::{AccountNo, Role};
use teller_core::{CoreError, Ledger, TransactionEngine};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Outcome of one dispatched command.
enum Reply {
    /// A single `OK ...` line.
    Line(String),
    /// A listing: the lines, then `END`.
    Listing(Vec<String>),
    /// Session over.
    Bye,
}

/// Identity established at login.
#[derive(Debug, Clone, Copy)]
struct Identity {
    acc_no: AccountNo,
    role: Role,
}

/// A single client session.
pub struct Session<R, W> {
    ledger: Arc<Ledger>,
    reader: R,
    writer: W,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a session over an already-accepted stream.
    pub fn new(ledger: Arc<Ledger>, reader: R, writer: W) -> Self {
        Self {
            ledger,
            reader,
            writer,
        }
    }

    /// Runs the session to completion: login, then the command loop.
    ///
    /// Returns `Ok(())` on clean logout, client disconnect, or a refused
    /// login; only I/O and engine-task failures surface as errors.
    ///
    /// # Errors
    ///
    /// Propagates stream I/O errors and blocking-pool join failures.
    pub async fn run(mut self) -> ServerResult<()> {
        let Some(identity) = self.login().await? else {
            return Ok(());
        };
        info!(acc_no = %identity.acc_no, role = %identity.role, "session authenticated");

        loop {
            let Some(line) = self.read_line().await? else {
                debug!(acc_no = %identity.acc_no, "client disconnected");
                return Ok(());
            };

            let reply = match Command::parse(identity.role, &line) {
                Ok(command) => self.dispatch(identity, command).await,
                Err(err) => Err(err),
            };

            match reply {
                Ok(Reply::Line(text)) => self.write_line(&text).await?,
                Ok(Reply::Listing(lines)) => {
                    for item in &lines {
                        self.write_line(item).await?;
                    }
                    self.write_line("END").await?;
                }
                Ok(Reply::Bye) => {
                    self.write_line("OK BYE").await?;
                    info!(acc_no = %identity.acc_no, "session logged out");
                    return Ok(());
                }
                Err(err @ (ServerError::Io(_) | ServerError::EngineTask(_))) => return Err(err),
                Err(err) => {
                    self.write_line(&format!("ERR {} {err}", error_code(&err)))
                        .await?;
                }
            }
        }
    }

    /// Runs the two-step login exchange.
    ///
    /// `None` means the session ends without an identity: the client
    /// disconnected or failed authentication.
    async fn login(&mut self) -> ServerResult<Option<Identity>> {
        self.write_line("ROLE?").await?;
        let Some(role_line) = self.read_line().await? else {
            return Ok(None);
        };
        let Ok(role) = role_line.trim().parse::<Role>() else {
            self.write_line("ERR AUTH authentication failed").await?;
            return Ok(None);
        };

        self.write_line("LOGIN?").await?;
        let Some(login_line) = self.read_line().await? else {
            return Ok(None);
        };

        match self.authenticate(role, &login_line).await {
            Ok(account) => {
                self.write_line(&format!("OK {} {} {}", account.acc_no, account.role, account.name))
                    .await?;
                Ok(Some(Identity {
                    acc_no: account.acc_no,
                    role,
                }))
            }
            Err(err @ (ServerError::Io(_) | ServerError::EngineTask(_))) => Err(err),
            Err(_) => {
                self.write_line("ERR AUTH authentication failed").await?;
                Ok(None)
            }
        }
    }

    /// Checks a `LOGIN <acc_no> <password>` line against the stored record.
    ///
    /// Wrong password, wrong role, and deactivated accounts all collapse
    /// into the same failure so a probing client learns nothing.
    async fn authenticate(&self, role: Role, line: &str) -> ServerResult<Account> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [verb, acc_no, password] = fields.as_slice() else {
            return Err(ServerError::AuthenticationFailed);
        };
        if *verb != "LOGIN" {
            return Err(ServerError::AuthenticationFailed);
        }
        let acc_no = acc_no
            .parse::<u32>()
            .map(AccountNo::new)
            .map_err(|_| ServerError::AuthenticationFailed)?;
        let password = (*password).to_owned();

        let account = self
            .with_engine(move |engine| engine.account(acc_no))
            .await
            .map_err(|_| ServerError::AuthenticationFailed)?;

        if !account.active || account.role != role || account.password != password {
            return Err(ServerError::AuthenticationFailed);
        }
        Ok(account)
    }

    async fn dispatch(&self, identity: Identity, command: Command) -> ServerResult<Reply> {
        match command {
            Command::Customer(cmd) => self.dispatch_customer(identity.acc_no, cmd).await,
            Command::Employee(cmd) => self.dispatch_employee(cmd).await,
            Command::Manager(cmd) => self.dispatch_manager(cmd).await,
            Command::Admin(cmd) => self.dispatch_admin(cmd).await,
        }
    }

    async fn dispatch_customer(
        &self,
        own: AccountNo,
        command: CustomerCommand,
    ) -> ServerResult<Reply> {
        match command {
            CustomerCommand::Deposit(amount) => {
                let balance = self
                    .with_engine(move |engine| engine.deposit(own, amount))
                    .await?;
                Ok(Reply::Line(format!("OK {balance:.2}")))
            }
            CustomerCommand::Withdraw(amount) => {
                let balance = self
                    .with_engine(move |engine| engine.withdraw(own, amount))
                    .await?;
                Ok(Reply::Line(format!("OK {balance:.2}")))
            }
            CustomerCommand::Transfer(to, amount) => {
                let (from_balance, _) = self
                    .with_engine(move |engine| engine.transfer(own, to, amount))
                    .await?;
                Ok(Reply::Line(format!("OK {from_balance:.2}")))
            }
            CustomerCommand::Balance => {
                let balance = self.with_engine(move |engine| engine.balance(own)).await?;
                Ok(Reply::Line(format!("OK {balance:.2}")))
            }
            CustomerCommand::ApplyLoan(amount, purpose) => {
                let loan_id = self
                    .with_engine(move |engine| engine.apply_loan(own, amount, &purpose))
                    .await?;
                Ok(Reply::Line(format!("OK {loan_id}")))
            }
            CustomerCommand::View => {
                let account = self.with_engine(move |engine| engine.account(own)).await?;
                Ok(Reply::Line(format!("OK {}", render_account(&account))))
            }
            CustomerCommand::Logout => Ok(Reply::Bye),
        }
    }

    async fn dispatch_employee(&self, command: EmployeeCommand) -> ServerResult<Reply> {
        match command {
            EmployeeCommand::ViewPending => {
                let loans = self
                    .with_engine(|engine| engine.loans_with_status(teller_core::LoanStatus::Pending))
                    .await?;
                Ok(Reply::Listing(loans.iter().map(render_loan).collect()))
            }
            EmployeeCommand::MarkReview(loan_id) => {
                self.with_engine(move |engine| {
                    engine.update_loan_status(loan_id, teller_core::LoanStatus::Reviewed)
                })
                .await?;
                Ok(Reply::Line("OK".into()))
            }
            EmployeeCommand::ViewAccount(acc_no) => {
                let account = self
                    .with_engine(move |engine| engine.account(acc_no))
                    .await?;
                Ok(Reply::Line(format!("OK {}", render_account(&account))))
            }
            EmployeeCommand::Logout => Ok(Reply::Bye),
        }
    }

    async fn dispatch_manager(&self, command: ManagerCommand) -> ServerResult<Reply> {
        match command {
            ManagerCommand::ListReviewed => {
                let loans = self
                    .with_engine(|engine| {
                        engine.loans_with_status(teller_core::LoanStatus::Reviewed)
                    })
                    .await?;
                Ok(Reply::Listing(loans.iter().map(render_loan).collect()))
            }
            ManagerCommand::Approve(loan_id) => {
                let balance = self
                    .with_engine(move |engine| engine.approve_loan(loan_id))
                    .await?;
                Ok(Reply::Line(format!("OK {balance:.2}")))
            }
            ManagerCommand::Reject(loan_id) => {
                self.with_engine(move |engine| {
                    engine.update_loan_status(loan_id, teller_core::LoanStatus::Rejected)
                })
                .await?;
                Ok(Reply::Line("OK".into()))
            }
            ManagerCommand::Logout => Ok(Reply::Bye),
        }
    }

    async fn dispatch_admin(&self, command: AdminCommand) -> ServerResult<Reply> {
        match command {
            AdminCommand::AddAccount {
                role,
                name,
                password,
                balance,
            } => {
                let acc_no = self
                    .with_engine(move |engine| engine.add_account(role, &name, &password, balance))
                    .await?;
                Ok(Reply::Line(format!("OK {acc_no}")))
            }
            AdminCommand::Deactivate(acc_no) => {
                self.with_engine(move |engine| engine.deactivate_account(acc_no))
                    .await?;
                Ok(Reply::Line("OK".into()))
            }
            AdminCommand::ViewAccount(acc_no) => {
                let account = self
                    .with_engine(move |engine| engine.account(acc_no))
                    .await?;
                Ok(Reply::Line(format!("OK {}", render_account(&account))))
            }
            AdminCommand::ViewAll => {
                let accounts = self.with_engine(|engine| engine.accounts()).await?;
                Ok(Reply::Listing(
                    accounts
                        .iter()
                        .map(|a| format!("ACCOUNT {}", render_account(a)))
                        .collect(),
                ))
            }
            AdminCommand::Logout => Ok(Reply::Bye),
        }
    }

    /// Runs one engine call on the blocking pool.
    async fn with_engine<T, F>(&self, f: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TransactionEngine) -> Result<T, CoreError> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        Ok(tokio::task::spawn_blocking(move || f(ledger.engine())).await??)
    }

    /// Reads one line, `None` on EOF. Trailing newline is stripped.
    async fn read_line(&mut self) -> ServerResult<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    async fn write_line(&mut self, text: &str) -> ServerResult<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

fn render_account(account: &Account) -> String {
    format!(
        "{} {} {} {:.2} {}",
        account.acc_no,
        account.role,
        account.name,
        account.balance,
        if account.active { "ACTIVE" } else { "INACTIVE" }
    )
}

fn render_loan(loan: &Loan) -> String {
    format!(
        "LOAN {} {} {:.2} {} {}",
        loan.loan_id, loan.acc_no, loan.amount, loan.status, loan.purpose
    )
}

/// Stable reply code per error class.
fn error_code(err: &ServerError) -> &'static str {
    match err {
        ServerError::InvalidCommand(_) => "BAD_COMMAND",
        ServerError::AuthenticationFailed => "AUTH",
        ServerError::Ledger(core) => match core {
            CoreError::AccountNotFound { .. } | CoreError::LoanNotFound { .. } => "NOT_FOUND",
            CoreError::Inactive { .. } => "INACTIVE",
            CoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CoreError::InvalidAmount { .. } => "INVALID_AMOUNT",
            CoreError::TransferToSelf { .. } => "INVALID_TRANSFER",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            _ => "IO_ERROR",
        },
        ServerError::EngineTask(_) | ServerError::Io(_) => "IO_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_core::types::LoanStatus;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Ledger seeded with the classic fixture set.
    fn fixture_ledger() -> Arc<Ledger> {
        let ledger = Ledger::open_in_memory().unwrap();
        let engine = ledger.engine();
        engine
            .add_account(Role::Customer, "cust101", "pass101", 1500.0)
            .unwrap();
        engine
            .add_account(Role::Customer, "cust102", "pass102", 3000.0)
            .unwrap();
        engine
            .add_account(Role::Employee, "emp201", "pass201", 0.0)
            .unwrap();
        engine
            .add_account(Role::Manager, "mgr301", "pass301", 0.0)
            .unwrap();
        engine.add_account(Role::Admin, "admin123", "1234", 0.0).unwrap();
        Arc::new(ledger)
    }

    /// Spawns a session over an in-memory duplex and returns the client
    /// side as (line reader, writer).
    fn connect(
        ledger: Arc<Ledger>,
    ) -> (
        BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
        tokio::io::WriteHalf<tokio::io::DuplexStream>,
        tokio::task::JoinHandle<ServerResult<()>>,
    ) {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = split(server);
        let session = Session::new(ledger, BufReader::new(server_read), server_write);
        let handle = tokio::spawn(session.run());

        let (client_read, client_write) = split(client);
        (BufReader::new(client_read), client_write, handle)
    }

    async fn expect(reader: &mut (impl AsyncBufReadExt + Unpin), want: &str) {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim_end(), want);
    }

    async fn send(writer: &mut (impl AsyncWriteExt + Unpin), line: &str) {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    async fn login(
        reader: &mut (impl AsyncBufReadExt + Unpin),
        writer: &mut (impl AsyncWriteExt + Unpin),
        role: &str,
        acc_no: u32,
        password: &str,
        expect_name: &str,
    ) {
        expect(reader, "ROLE?").await;
        send(writer, role).await;
        expect(reader, "LOGIN?").await;
        send(writer, &format!("LOGIN {acc_no} {password}")).await;
        expect(reader, &format!("OK {acc_no} {role} {expect_name}")).await;
    }

    #[tokio::test]
    async fn customer_deposit_and_balance() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());
        login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;

        send(&mut writer, "DEPOSIT 500").await;
        expect(&mut reader, "OK 2000.00").await;

        send(&mut writer, "BALANCE").await;
        expect(&mut reader, "OK 2000.00").await;

        send(&mut writer, "LOGOUT").await;
        expect(&mut reader, "OK BYE").await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn withdraw_overdraft_is_refused_not_fatal() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());
        login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;

        send(&mut writer, "WITHDRAW 9999").await;
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("ERR INSUFFICIENT_FUNDS"), "{line}");

        // The session survives the refusal.
        send(&mut writer, "BALANCE").await;
        expect(&mut reader, "OK 1500.00").await;

        send(&mut writer, "LOGOUT").await;
        expect(&mut reader, "OK BYE").await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wrong_password_is_refused() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());

        expect(&mut reader, "ROLE?").await;
        send(&mut writer, "CUSTOMER").await;
        expect(&mut reader, "LOGIN?").await;
        send(&mut writer, "LOGIN 1 wrong").await;
        expect(&mut reader, "ERR AUTH authentication failed").await;

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn role_mismatch_is_refused() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());

        // Account 1 is a customer; claiming MANAGER must fail even with
        // the right password.
        expect(&mut reader, "ROLE?").await;
        send(&mut writer, "MANAGER").await;
        expect(&mut reader, "LOGIN?").await;
        send(&mut writer, "LOGIN 1 pass101").await;
        expect(&mut reader, "ERR AUTH authentication failed").await;

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn command_outside_role_grammar_is_rejected() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());
        login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;

        send(&mut writer, "APPROVE 1").await;
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("ERR BAD_COMMAND"), "{line}");

        send(&mut writer, "LOGOUT").await;
        expect(&mut reader, "OK BYE").await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn transfer_between_customers() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());
        login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;

        send(&mut writer, "TRANSFER 2 500").await;
        expect(&mut reader, "OK 1000.00").await;

        send(&mut writer, "LOGOUT").await;
        expect(&mut reader, "OK BYE").await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn loan_lifecycle_across_three_roles() {
        let ledger = fixture_ledger();

        // Customer applies.
        {
            let (mut reader, mut writer, handle) = connect(Arc::clone(&ledger));
            login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;
            send(&mut writer, "APPLY_LOAN 1000 home repair").await;
            expect(&mut reader, "OK 1").await;
            send(&mut writer, "LOGOUT").await;
            expect(&mut reader, "OK BYE").await;
            handle.await.unwrap().unwrap();
        }

        // Employee sees it pending and marks it reviewed.
        {
            let (mut reader, mut writer, handle) = connect(Arc::clone(&ledger));
            login(&mut reader, &mut writer, "EMPLOYEE", 3, "pass201", "emp201").await;
            send(&mut writer, "VIEW_PENDING").await;
            expect(&mut reader, "LOAN 1 1 1000.00 PENDING home repair").await;
            expect(&mut reader, "END").await;
            send(&mut writer, "MARK_REVIEW 1").await;
            expect(&mut reader, "OK").await;
            send(&mut writer, "LOGOUT").await;
            expect(&mut reader, "OK BYE").await;
            handle.await.unwrap().unwrap();
        }

        // Manager approves; borrower is credited.
        {
            let (mut reader, mut writer, handle) = connect(Arc::clone(&ledger));
            login(&mut reader, &mut writer, "MANAGER", 4, "pass301", "mgr301").await;
            send(&mut writer, "APPROVE 1").await;
            expect(&mut reader, "OK 2500.00").await;
            send(&mut writer, "LOGOUT").await;
            expect(&mut reader, "OK BYE").await;
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            ledger.engine().loan(teller_core::LoanId::new(1)).unwrap().status,
            LoanStatus::Approved
        );
    }

    #[tokio::test]
    async fn admin_add_view_deactivate() {
        let ledger = fixture_ledger();
        let (mut reader, mut writer, handle) = connect(Arc::clone(&ledger));
        login(&mut reader, &mut writer, "ADMIN", 5, "1234", "admin123").await;

        send(&mut writer, "ADD_ACCOUNT CUSTOMER cust103 pass103 250").await;
        expect(&mut reader, "OK 6").await;

        send(&mut writer, "VIEW_ACCOUNT 6").await;
        expect(&mut reader, "OK 6 CUSTOMER cust103 250.00 ACTIVE").await;

        send(&mut writer, "DEACTIVATE 6").await;
        expect(&mut reader, "OK").await;

        send(&mut writer, "VIEW_ACCOUNT 6").await;
        expect(&mut reader, "OK 6 CUSTOMER cust103 250.00 INACTIVE").await;

        send(&mut writer, "LOGOUT").await;
        expect(&mut reader, "OK BYE").await;
        handle.await.unwrap().unwrap();

        // Deactivated accounts cannot log in.
        let (mut reader, mut writer, handle) = connect(ledger);
        expect(&mut reader, "ROLE?").await;
        send(&mut writer, "CUSTOMER").await;
        expect(&mut reader, "LOGIN?").await;
        send(&mut writer, "LOGIN 6 pass103").await;
        expect(&mut reader, "ERR AUTH authentication failed").await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn disconnect_mid_session_is_clean() {
        let (mut reader, mut writer, handle) = connect(fixture_ledger());
        login(&mut reader, &mut writer, "CUSTOMER", 1, "pass101", "cust101").await;

        drop(writer);
        drop(reader);
        handle.await.unwrap().unwrap();
    }
}
