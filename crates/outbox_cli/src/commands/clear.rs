//! Clear command implementation.

use super::open_existing;
use std::path::Path;

/// Runs the clear command.
pub fn run(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(dir)?;
    let removed = store.clear()?;
    println!("Removed {removed} pending write(s).");
    Ok(())
}
