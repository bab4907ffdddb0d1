use std::path::Path;

use fieldsync_core::models::Settings;
use fieldsync_core::LocalStore;

use crate::cli::SettingsCommands;
use crate::commands::common::open_store;
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

pub async fn run_settings(
    command: Option<SettingsCommands>,
    db_path: &Path,
) -> Result<(), CliError> {
    match command.unwrap_or(SettingsCommands::Show { json: false }) {
        SettingsCommands::Show { json } => run_settings_show(json, db_path).await,
        SettingsCommands::Set {
            auto_sync,
            active_trial,
            clear_active_trial,
        } => run_settings_set(auto_sync, active_trial, clear_active_trial, db_path).await,
    }
}

async fn run_settings_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let settings = store.load_settings().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        for line in format_settings_lines(&settings) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn run_settings_set(
    auto_sync: Option<bool>,
    active_trial: Option<String>,
    clear_active_trial: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let current = store.load_settings().await?;
    let updated = apply_settings_update(current, auto_sync, active_trial, clear_active_trial);
    store.save_settings(&updated).await?;

    for line in format_settings_lines(&updated) {
        println!("{line}");
    }
    Ok(())
}

pub fn apply_settings_update(
    mut settings: Settings,
    auto_sync: Option<bool>,
    active_trial: Option<String>,
    clear_active_trial: bool,
) -> Settings {
    if let Some(enabled) = auto_sync {
        settings.auto_sync = enabled;
    }
    if clear_active_trial {
        settings.active_trial_id = None;
    } else if let Some(trial) = normalize_text_option(active_trial) {
        settings.active_trial_id = Some(trial);
    }
    settings
}

pub fn format_settings_lines(settings: &Settings) -> Vec<String> {
    vec![
        format!(
            "auto_sync:       {}",
            if settings.auto_sync { "on" } else { "off" }
        ),
        format!(
            "active_trial_id: {}",
            settings.active_trial_id.as_deref().unwrap_or("(none)")
        ),
    ]
}
