//! Inspect command implementation.

use super::open_existing;
use outbox_queue::QueueStats;
use serde::Serialize;
use std::path::Path;

/// Queue inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Queue directory.
    pub path: String,
    /// Store statistics.
    #[serde(flatten)]
    pub stats: QueueStats,
}

/// Runs the inspect command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(dir)?;
    let result = InspectResult {
        path: dir.display().to_string(),
        stats: store.stats()?,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Outbox: {}", result.path);
    println!("  Pending records: {}", result.stats.records);
    println!("  Log size:        {} bytes", result.stats.log_bytes);
    println!("  Next key:        {}", result.stats.next_key);
}
