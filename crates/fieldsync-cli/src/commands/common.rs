use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fieldsync_core::config::ClientConfig;
use fieldsync_core::models::{PendingSyncAction, Plot, SyncRun};
use fieldsync_core::sync::HttpSyncTransport;
use fieldsync_core::{ActionId, FieldStore, LocalStore};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ActionListItem {
    pub id: String,
    pub sequence: i64,
    pub action_type: String,
    pub entity_type: String,
    pub state: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub enqueued_at: i64,
    pub enqueued_at_iso: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SyncRunItem {
    pub started_at_iso: String,
    pub finished_at_iso: String,
    pub synced: i64,
    pub dead_lettered: i64,
    pub error: Option<String>,
}

pub async fn open_store(db_path: &Path) -> Result<FieldStore, CliError> {
    Ok(FieldStore::open_path(db_path).await?)
}

/// Resolved client config for the selected profile, with env overrides
pub fn load_client_config(profile: Option<&str>) -> Result<ClientConfig, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let stored = config.profile(&profile_name).cloned().unwrap_or_default();
    stored
        .client_config(env::var("FIELDSYNC_API_URL").ok())
        .map_err(CliError::Config)
}

/// HTTP transport for the selected profile; the token only ever comes from
/// the environment
pub fn build_transport(config: &ClientConfig) -> Result<HttpSyncTransport, CliError> {
    if config.api_base_url.is_none() {
        return Err(CliError::SyncNotConfigured);
    }
    let token = normalize_text_option(env::var("FIELDSYNC_API_TOKEN").ok());
    Ok(HttpSyncTransport::from_config(config, token)?)
}

/// Active trial from the flag, falling back to the stored setting
pub async fn resolve_active_trial(
    explicit: Option<String>,
    store: &FieldStore,
) -> Result<Option<String>, CliError> {
    if let Some(trial) = normalize_text_option(explicit) {
        return Ok(Some(trial));
    }
    Ok(store.load_settings().await?.active_trial_id)
}

pub fn parse_action_id(value: &str) -> Result<ActionId, CliError> {
    value
        .parse::<ActionId>()
        .map_err(|_| CliError::InvalidActionId(value.trim().to_string()))
}

/// Split a `trait=value` argument; the value may itself contain `=`
pub fn parse_assignment(raw: &str) -> Result<(String, String), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn action_to_item(action: &PendingSyncAction) -> ActionListItem {
    ActionListItem {
        id: action.id.to_string(),
        sequence: action.sequence,
        action_type: action.action_type.to_string(),
        entity_type: action.entity_type.to_string(),
        state: action.state.to_string(),
        attempts: action.attempts,
        last_error: action.last_error.clone(),
        enqueued_at: action.enqueued_at,
        enqueued_at_iso: format_timestamp(action.enqueued_at),
        payload: action.payload.clone(),
    }
}

pub fn format_action_lines(actions: &[PendingSyncAction]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    actions
        .iter()
        .map(|action| {
            let id = action.id.to_string();
            let kind = format!("{} {}", action.action_type, action.entity_type);
            let summary = payload_summary(&action.payload);
            let age = format_relative_time(action.enqueued_at, now_ms);
            let mut line = format!("{id}  {kind:<18}  {summary:<32}  {age}");
            if action.attempts > 0 {
                line.push_str(&format!("  attempts={}", action.attempts));
            }
            if let Some(error) = action.last_error.as_deref() {
                line.push_str(&format!("  error={error}"));
            }
            line
        })
        .collect()
}

/// Short description of an observation payload; other payloads show their keys
pub fn payload_summary(payload: &serde_json::Value) -> String {
    let plot = payload.get("plot_id").and_then(serde_json::Value::as_str);
    let trait_id = payload.get("trait_id").and_then(serde_json::Value::as_str);
    match (plot, trait_id, payload.get("value")) {
        (Some(plot), Some(trait_id), Some(value)) => {
            let value = value
                .as_str()
                .map_or_else(|| value.to_string(), ToString::to_string);
            format!("{plot}/{trait_id}={value}")
        }
        _ => payload.as_object().map_or_else(
            || payload.to_string(),
            |object| object.keys().cloned().collect::<Vec<_>>().join(","),
        ),
    }
}

pub fn format_plot_line(plot: &Plot) -> String {
    format!(
        "{:<20}  #{:<5}  {:<20}  {}",
        plot.id, plot.plot_number, plot.accession_name, plot.trial_id
    )
}

pub fn sync_run_to_item(run: &SyncRun) -> SyncRunItem {
    SyncRunItem {
        started_at_iso: format_timestamp(run.started_at),
        finished_at_iso: format_timestamp(run.finished_at),
        synced: run.synced,
        dead_lettered: run.dead_lettered,
        error: run.error.clone(),
    }
}

pub fn format_sync_run_lines(runs: &[SyncRun]) -> Vec<String> {
    runs.iter()
        .map(|run| {
            let outcome = run
                .error
                .as_deref()
                .map_or_else(|| "ok".to_string(), |error| format!("halted: {error}"));
            format!(
                "{}  synced={} dead_lettered={}  {outcome}",
                format_timestamp(run.finished_at),
                run.synced,
                run.dead_lettered
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("FIELDSYNC_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("fieldsync").join("fieldsync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}
