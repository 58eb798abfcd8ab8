//! Watch command implementation.

use super::sync::describe;
use outbox_sync::{ConnectivitySignal, Outbox, ReachabilityProbe, SyncConfig, SyncOutcome};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Runs the watch command until Ctrl-C.
pub async fn run(dir: &Path, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let outbox = Outbox::open(dir, config.clone())?;
    let signal = ConnectivitySignal::new();
    let probe = ReachabilityProbe::new(&config, signal.clone())?;
    info!(addr = probe.target(), pending = outbox.store().len(), "watching origin");

    let mut reports = outbox.subscribe();
    let probe_task = probe.spawn();
    let sync_task = outbox.start(&signal);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            report = reports.recv() => match report {
                Ok(report) => {
                    let outcome = SyncOutcome::Synced {
                        submitted: report.submitted,
                        records: report.records,
                    };
                    println!("{}", describe(&outcome));
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "missed sync reports"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    probe_task.abort();
    sync_task.abort();
    info!(pending = outbox.store().len(), "stopped watching");
    Ok(())
}
