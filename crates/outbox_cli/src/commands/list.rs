//! List command implementation.

use super::open_existing;
use outbox_queue::QueuedRecord;
use std::path::Path;

/// Runs the list command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(dir)?;
    let snapshot = store.read_all()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(snapshot.records())?);
        }
        _ => {
            print_text_output(snapshot.records())?;
        }
    }

    Ok(())
}

fn print_text_output(records: &[QueuedRecord]) -> Result<(), serde_json::Error> {
    if records.is_empty() {
        println!("No pending writes.");
        return Ok(());
    }

    println!("{} pending write(s):", records.len());
    for record in records {
        println!("  {}  {}", record.key, serde_json::to_string(&record.payload)?);
    }
    Ok(())
}
