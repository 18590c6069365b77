//! WAL dump command implementation.

use std::path::Path;
use teller_core::Ledger;

/// Prints the raw write-ahead log, newest last.
pub fn run(path: &Path, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::open(path)?;
    let lines = ledger.engine().wal_lines()?;

    let skip = match limit {
        Some(limit) if limit < lines.len() => lines.len() - limit,
        _ => 0,
    };
    for (index, line) in lines.iter().enumerate().skip(skip) {
        println!("{index:>6}  {line}");
    }
    Ok(())
}
