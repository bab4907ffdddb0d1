use std::path::Path;
use std::time::Duration;

use fieldsync_core::sync::{
    Connectivity, DrainOutcome, DrainReport, HttpSyncTransport, SkipReason, SyncService,
    SyncStatus,
};
use fieldsync_core::FieldStore;
use tokio::sync::watch;

use crate::commands::common::{build_transport, load_client_config, open_store};
use crate::commands::status::format_status_line;
use crate::error::CliError;

type CliSyncService = SyncService<FieldStore, HttpSyncTransport>;

pub async fn run_sync(
    watch_mode: bool,
    interval_secs: u64,
    profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_client_config(profile)?;
    let transport = build_transport(&config)?;
    let store = open_store(db_path).await?;

    let connectivity = Connectivity::new(transport.check_connectivity().await);
    let service = SyncService::new(
        store,
        transport.clone(),
        connectivity.clone(),
        config.sync_options(),
    );

    if watch_mode {
        let interval = Duration::from_secs(interval_secs.max(1));
        run_sync_watch(&service, &transport, &connectivity, interval).await;
        return Ok(());
    }

    match service.sync_now().await? {
        DrainOutcome::Skipped(SkipReason::Offline) => {
            Err(CliError::ServerUnreachable(transport.base_url().to_string()))
        }
        DrainOutcome::Skipped(reason) => {
            println!("Sync skipped: {reason}");
            Ok(())
        }
        DrainOutcome::Finished(report) => {
            println!("{}", format_drain_report(&report));
            match report.halted {
                Some(halt) => Err(CliError::SyncHalted {
                    action_id: halt.action_id.to_string(),
                    error: halt.error,
                }),
                None => Ok(()),
            }
        }
    }
}

async fn run_sync_watch(
    service: &CliSyncService,
    transport: &HttpSyncTransport,
    connectivity: &Connectivity,
    interval: Duration,
) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let probe = || {
        let transport = transport.clone();
        async move { transport.check_connectivity().await }
    };

    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {error}");
        }
        let _ = shutdown_tx.send(true);
    };

    println!(
        "Watching {} (poll every {}s, ctrl-c to stop)",
        transport.base_url(),
        interval.as_secs()
    );
    tokio::join!(
        service.run(shutdown_rx.clone()),
        connectivity.poll(interval, probe, shutdown_rx.clone()),
        print_status_changes(service.subscribe(), shutdown_rx),
        ctrl_c,
    );
}

async fn print_status_changes(
    mut status_rx: watch::Receiver<SyncStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_line = String::new();
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = format_status_line(&status_rx.borrow_and_update());
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

pub fn format_drain_report(report: &DrainReport) -> String {
    let mut line = format!(
        "Synced {}, dead-lettered {}, {} remaining",
        report.synced, report.dead_lettered, report.remaining
    );
    if let Some(halt) = report.halted.as_ref() {
        let kind = if halt.retryable {
            "will retry"
        } else {
            "needs attention"
        };
        line.push_str(&format!(" (stopped at {}, {kind})", halt.action_id));
    }
    line
}
