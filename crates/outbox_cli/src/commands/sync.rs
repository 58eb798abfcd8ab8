//! Sync command implementation.

use outbox_sync::{Outbox, SyncConfig, SyncOutcome};
use std::path::Path;

/// Runs the sync command.
pub async fn run(dir: &Path, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let outbox = Outbox::open(dir, config)?;
    let outcome = outbox.drain_and_sync().await?;
    println!("{}", describe(&outcome));
    Ok(())
}

/// One-line summary of a sync outcome.
pub fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Empty => "Nothing to sync.".to_string(),
        SyncOutcome::Synced { submitted, .. } => {
            format!("All saved pizza has been submitted! ({submitted} record(s))")
        }
        SyncOutcome::Failed { reason, pending } => {
            format!("Sync failed: {reason}. {pending} record(s) still pending.")
        }
        SyncOutcome::AlreadyRunning => "A sync is already running.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_sync::SyncFailure;

    #[test]
    fn describes_outcomes() {
        assert_eq!(describe(&SyncOutcome::Empty), "Nothing to sync.");
        assert!(describe(&SyncOutcome::Synced {
            submitted: 2,
            records: vec![],
        })
        .starts_with("All saved pizza has been submitted!"));
        assert_eq!(
            describe(&SyncOutcome::Failed {
                reason: SyncFailure::Business("validation failed".into()),
                pending: 2,
            }),
            "Sync failed: origin rejected batch: validation failed. 2 record(s) still pending."
        );
    }
}
