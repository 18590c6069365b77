//! Accounts listing command implementation.

use std::path::Path;
use teller_core::Ledger;

/// Prints every account record, optionally including inactive ones.
pub fn run(path: &Path, include_inactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::open(path)?;
    let accounts = ledger.engine().accounts()?;

    println!("{:<8} {:<10} {:<20} {:>12} {:<8}", "ACC", "ROLE", "NAME", "BALANCE", "STATE");
    for account in accounts {
        if !account.active && !include_inactive {
            continue;
        }
        println!(
            "{:<8} {:<10} {:<20} {:>12.2} {:<8}",
            account.acc_no.to_string(),
            account.role.to_string(),
            account.name,
            account.balance,
            if account.active { "ACTIVE" } else { "INACTIVE" }
        );
    }
    Ok(())
}
