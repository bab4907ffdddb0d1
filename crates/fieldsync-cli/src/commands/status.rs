use std::path::Path;

use fieldsync_core::models::SyncRun;
use fieldsync_core::sync::SyncStatus;
use fieldsync_core::LocalStore;
use serde::Serialize;

use crate::commands::common::{
    build_transport, format_sync_run_lines, format_timestamp, load_client_config, open_store,
    sync_run_to_item, SyncRunItem,
};
use crate::error::CliError;

const LAST_SUCCESS_LOOKBACK: usize = 50;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub api_base_url: Option<String>,
    /// Only present when the server was probed
    pub online: Option<bool>,
    pub pending: u64,
    pub dead_letter: u64,
    pub oldest_pending_at_iso: Option<String>,
    pub auto_sync: bool,
    pub active_trial_id: Option<String>,
    pub last_sync_at_iso: Option<String>,
    pub recent_runs: Vec<SyncRunItem>,
}

pub async fn run_status(
    run_limit: usize,
    probe: bool,
    as_json: bool,
    profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let (api_base_url, online) = if probe {
        let config = load_client_config(profile)?;
        let transport = build_transport(&config)?;
        (config.api_base_url, Some(transport.check_connectivity().await))
    } else {
        let config = load_client_config(profile).ok();
        (config.and_then(|config| config.api_base_url), None)
    };

    let store = open_store(db_path).await?;
    let stats = store.queue_stats().await?;
    let settings = store.load_settings().await?;
    let runs = store
        .list_sync_runs(run_limit.max(LAST_SUCCESS_LOOKBACK))
        .await?;

    let report = StatusReport {
        api_base_url,
        online,
        pending: stats.pending,
        dead_letter: stats.dead_letter,
        oldest_pending_at_iso: stats.oldest_pending_at.map(format_timestamp),
        auto_sync: settings.auto_sync,
        active_trial_id: settings.active_trial_id,
        last_sync_at_iso: last_successful_sync(&runs).map(format_timestamp),
        recent_runs: runs.iter().take(run_limit).map(sync_run_to_item).collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_report(&report) {
        println!("{line}");
    }
    let shown = runs.iter().take(run_limit).cloned().collect::<Vec<_>>();
    if !shown.is_empty() {
        println!("Recent syncs:");
        for line in format_sync_run_lines(&shown) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub fn last_successful_sync(runs: &[SyncRun]) -> Option<i64> {
    runs.iter()
        .find(|run| run.succeeded())
        .map(|run| run.finished_at)
}

pub fn format_status_report(report: &StatusReport) -> Vec<String> {
    let server = report.api_base_url.as_deref().unwrap_or("(not configured)");
    let reachability = match report.online {
        Some(true) => " [reachable]",
        Some(false) => " [unreachable]",
        None => "",
    };
    let mut lines = vec![
        format!("Server:       {server}{reachability}"),
        format!("Pending:      {}", report.pending),
        format!("Dead letter:  {}", report.dead_letter),
    ];
    if let Some(oldest) = report.oldest_pending_at_iso.as_deref() {
        lines.push(format!("Oldest:       {oldest}"));
    }
    lines.push(format!(
        "Auto sync:    {}",
        if report.auto_sync { "on" } else { "off" }
    ));
    lines.push(format!(
        "Active trial: {}",
        report.active_trial_id.as_deref().unwrap_or("(none)")
    ));
    lines.push(format!(
        "Last sync:    {}",
        report.last_sync_at_iso.as_deref().unwrap_or("never")
    ));
    lines
}

pub fn format_status_line(status: &SyncStatus) -> String {
    let mut line = format!(
        "{}  pending={} dead_letter={}",
        if status.is_online { "online" } else { "offline" },
        status.pending_count,
        status.dead_letter_count
    );
    if status.is_syncing {
        line.push_str("  syncing");
    }
    if let Some(error) = status.last_error.as_deref() {
        line.push_str(&format!("  last_error={error}"));
    }
    line
}
