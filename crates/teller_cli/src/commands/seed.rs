//! Seed command implementation.
//!
//! Creates the standard demo fixture: two customers with opening
//! balances, an employee, a manager, and an administrator.

use std::path::Path;
use teller_core::types::Role;
use teller_core::Ledger;

const FIXTURES: &[(Role, &str, &str, f64)] = &[
    (Role::Customer, "cust101", "pass101", 1500.0),
    (Role::Customer, "cust102", "pass102", 3000.0),
    (Role::Employee, "emp201", "pass201", 0.0),
    (Role::Manager, "mgr301", "pass301", 0.0),
    (Role::Admin, "admin123", "1234", 0.0),
];

/// Seeds a fresh ledger with the demo accounts.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::open(path)?;
    if !ledger.engine().accounts()?.is_empty() {
        return Err("ledger already has accounts; refusing to seed".into());
    }

    for (role, name, password, balance) in FIXTURES {
        let acc_no = ledger.engine().add_account(*role, name, password, *balance)?;
        println!("created {acc_no}: {role} {name} balance {balance:.2}");
    }
    Ok(())
}
