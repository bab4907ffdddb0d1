use std::path::{Path, PathBuf};

use clap::Parser;
use fieldsync_core::models::{
    ActionId, NewSyncAction, PendingSyncAction, Plot, Settings, SyncRun, Trait, TraitDataType,
};
use fieldsync_core::observation::ObservationForm;
use fieldsync_core::sync::{DrainReport, HaltReason, RejectionPolicy, SyncStatus};
use fieldsync_core::{FieldStore, LocalStore, QueueWriter};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::{Cli, Commands, CompletionShell, DeadLetterCommands, RejectionPolicyArg};
use crate::commands::common::{
    action_to_item, format_action_lines, format_relative_time, format_timestamp, parse_action_id,
    parse_assignment, payload_summary,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{merge_profile, ProfileUpdate};
use crate::commands::dead_letter::run_dead_letter;
use crate::commands::import::run_import;
use crate::commands::observe::{form_advisories, format_form_lines, run_observe};
use crate::commands::settings::apply_settings_update;
use crate::commands::status::{format_status_line, last_successful_sync};
use crate::commands::sync::format_drain_report;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn plot(id: &str, trial_id: &str, plot_number: i64) -> Plot {
    Plot {
        id: id.to_string(),
        trial_id: trial_id.to_string(),
        plot_number,
        accession_name: format!("ACC-{plot_number}"),
    }
}

fn height_trait() -> Trait {
    Trait {
        id: "t-height".to_string(),
        trial_id: "T1".to_string(),
        name: "Plant Height".to_string(),
        unit: Some("cm".to_string()),
        data_type: TraitDataType::Numeric,
        min: Some(0.0),
        max: Some(300.0),
    }
}

fn notes_trait() -> Trait {
    Trait {
        id: "t-notes".to_string(),
        trial_id: "T1".to_string(),
        name: "Notes".to_string(),
        unit: None,
        data_type: TraitDataType::Text,
        min: None,
        max: None,
    }
}

fn write_bundle(dir: &Path) -> PathBuf {
    let bundle = json!({
        "plots": [plot("p-101", "T1", 101), plot("p-102", "T1", 102)],
        "traits": [height_trait(), notes_trait()],
    });
    let path = dir.join("bundle.json");
    std::fs::write(&path, serde_json::to_string_pretty(&bundle).unwrap()).unwrap();
    path
}

fn sample_action(payload: serde_json::Value) -> PendingSyncAction {
    let action = NewSyncAction::create_observation(payload);
    PendingSyncAction {
        id: action.id,
        sequence: 7,
        action_type: action.action_type,
        entity_type: action.entity_type,
        payload: action.payload,
        enqueued_at: 0,
        attempts: 2,
        last_error: Some("HTTP 503".to_string()),
        last_attempt_at: Some(1_000),
        state: fieldsync_core::models::ActionState::Pending,
    }
}

#[test]
fn parse_assignment_splits_on_first_equals() {
    assert_eq!(
        parse_assignment("Plant Height=42").unwrap(),
        ("Plant Height".to_string(), "42".to_string())
    );
    assert_eq!(
        parse_assignment("notes=a=b").unwrap(),
        ("notes".to_string(), "a=b".to_string())
    );
    assert_eq!(
        parse_assignment("height=").unwrap(),
        ("height".to_string(), String::new())
    );
    assert!(matches!(
        parse_assignment("height"),
        Err(CliError::InvalidAssignment(_))
    ));
    assert!(matches!(
        parse_assignment(" =5"),
        Err(CliError::InvalidAssignment(_))
    ));
}

#[test]
fn parse_action_id_rejects_garbage() {
    let id = ActionId::new();
    assert_eq!(parse_action_id(&format!(" {id} ")).unwrap(), id);
    assert!(matches!(
        parse_action_id("not-a-uuid"),
        Err(CliError::InvalidActionId(value)) if value == "not-a-uuid"
    ));
}

#[test]
fn payload_summary_describes_observations() {
    let numeric = json!({ "plot_id": "p-1", "trait_id": "t-height", "value": 42.5 });
    assert_eq!(payload_summary(&numeric), "p-1/t-height=42.5");

    let text = json!({ "plot_id": "p-1", "trait_id": "t-notes", "value": "lodged" });
    assert_eq!(payload_summary(&text), "p-1/t-notes=lodged");

    let other = json!({ "germplasmName": "IR64", "species": "sativa" });
    assert_eq!(payload_summary(&other), "germplasmName,species");
}

#[test]
fn action_lines_include_attempts_and_error() {
    let action = sample_action(json!({ "plot_id": "p-1", "trait_id": "t-1", "value": 3 }));
    let lines = format_action_lines(std::slice::from_ref(&action));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&action.id.to_string()));
    assert!(lines[0].contains("CREATE OBSERVATION"));
    assert!(lines[0].contains("p-1/t-1=3"));
    assert!(lines[0].contains("attempts=2"));
    assert!(lines[0].contains("error=HTTP 503"));

    let item = action_to_item(&action);
    assert_eq!(item.state, "pending");
    assert_eq!(item.enqueued_at_iso, "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
    assert_eq!(format_relative_time(now - 21 * 24 * 60 * 60_000, now), "3w ago");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn drain_report_mentions_halt() {
    let clean = DrainReport {
        synced: 3,
        dead_lettered: 1,
        remaining: 0,
        halted: None,
    };
    assert_eq!(
        format_drain_report(&clean),
        "Synced 3, dead-lettered 1, 0 remaining"
    );

    let action_id = ActionId::new();
    let halted = DrainReport {
        synced: 1,
        dead_lettered: 0,
        remaining: 2,
        halted: Some(HaltReason {
            action_id,
            error: "HTTP 503".to_string(),
            retryable: true,
        }),
    };
    assert_eq!(
        format_drain_report(&halted),
        format!("Synced 1, dead-lettered 0, 2 remaining (stopped at {action_id}, will retry)")
    );
}

#[test]
fn status_line_reflects_state() {
    let status = SyncStatus {
        is_online: true,
        is_syncing: true,
        pending_count: 4,
        dead_letter_count: 1,
        last_error: Some("timed out".to_string()),
        last_sync_at: None,
    };
    assert_eq!(
        format_status_line(&status),
        "online  pending=4 dead_letter=1  syncing  last_error=timed out"
    );
    assert_eq!(
        format_status_line(&SyncStatus::default()),
        "offline  pending=0 dead_letter=0"
    );
}

#[test]
fn last_successful_sync_skips_halted_runs() {
    let runs = vec![
        SyncRun {
            id: 3,
            started_at: 300,
            finished_at: 310,
            synced: 0,
            dead_lettered: 0,
            error: Some("HTTP 503".to_string()),
        },
        SyncRun {
            id: 2,
            started_at: 200,
            finished_at: 210,
            synced: 5,
            dead_lettered: 0,
            error: None,
        },
    ];
    assert_eq!(last_successful_sync(&runs), Some(210));
    assert_eq!(last_successful_sync(&runs[..1]), None);
}

#[test]
fn settings_update_sets_and_clears_trial() {
    let settings = Settings::default();
    let updated = apply_settings_update(settings, Some(false), Some(" T9 ".to_string()), false);
    assert_eq!(
        updated,
        Settings {
            auto_sync: false,
            active_trial_id: Some("T9".to_string()),
        }
    );

    let cleared = apply_settings_update(updated, None, None, true);
    assert_eq!(cleared.active_trial_id, None);
    assert!(!cleared.auto_sync);
}

#[test]
fn merge_profile_keeps_existing_values_and_validates() {
    let existing = CliProfile {
        api_base_url: Some("https://brapi.example.org".to_string()),
        retry_base_secs: Some(10),
        ..CliProfile::default()
    };

    let merged = merge_profile(
        existing.clone(),
        ProfileUpdate {
            rejection_policy: Some(RejectionPolicyArg::Halt),
            ..ProfileUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(merged.api_base_url, existing.api_base_url);
    assert_eq!(merged.retry_base_secs, Some(10));
    assert_eq!(merged.rejection_policy, Some(RejectionPolicy::Halt));

    let trimmed = merge_profile(
        CliProfile::default(),
        ProfileUpdate {
            api_base_url: Some("http://localhost:8080/".to_string()),
            ..ProfileUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(
        trimmed.api_base_url.as_deref(),
        Some("http://localhost:8080")
    );

    let invalid = merge_profile(
        CliProfile::default(),
        ProfileUpdate {
            request_timeout_secs: Some(0),
            ..ProfileUpdate::default()
        },
    );
    assert!(matches!(invalid, Err(CliError::Config(_))));
}

#[test]
fn cli_parses_observe_assignments() {
    let cli = Cli::try_parse_from([
        "fieldsync",
        "observe",
        "101",
        "--trial",
        "T1",
        "--set",
        "Plant Height=42",
        "-s",
        "notes=lodged",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Observe {
            code,
            trial,
            values,
        }) => {
            assert_eq!(code, "101");
            assert_eq!(trial.as_deref(), Some("T1"));
            assert_eq!(values, vec!["Plant Height=42", "notes=lodged"]);
        }
        _ => panic!("expected observe command"),
    }
}

#[test]
fn cli_parses_dead_letter_retry_and_global_flags() {
    let cli = Cli::try_parse_from([
        "fieldsync",
        "dead-letter",
        "retry",
        "abc",
        "--db-path",
        "/tmp/field.db",
        "--profile",
        "station",
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/field.db")));
    assert_eq!(cli.profile.as_deref(), Some("station"));
    assert!(matches!(
        cli.command,
        Some(Commands::DeadLetter {
            command: DeadLetterCommands::Retry { ref id }
        }) if id == "abc"
    ));
}

#[test]
fn settings_set_rejects_conflicting_trial_flags() {
    let result = Cli::try_parse_from([
        "fieldsync",
        "settings",
        "set",
        "--active-trial",
        "T1",
        "--clear-active-trial",
    ]);
    assert!(result.is_err());
}

#[test]
fn completions_name_the_binary() {
    for shell in [
        CompletionShell::Bash,
        CompletionShell::Zsh,
        CompletionShell::Fish,
    ] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("fieldsync"), "{shell:?} completions");
    }
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn form_lines_and_advisories_follow_trait_order() {
    let store = FieldStore::open_in_memory().await.unwrap();
    store.upsert_plots(&[plot("p-101", "T1", 101)]).await.unwrap();
    store
        .upsert_traits(&[height_trait(), notes_trait()])
        .await
        .unwrap();

    let mut form = ObservationForm::load(&store, "p-101").await.unwrap();
    let lines = format_form_lines(&form);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Notes"));
    assert!(lines[1].contains("Plant Height (cm)"));
    assert!(lines[1].contains("numeric"));
    assert!(lines[1].contains("0 - 300 cm"));

    form.set_value("plant height", "450").unwrap();
    form.set_value("t-notes", "lodged").unwrap();
    assert_eq!(
        form_advisories(&form),
        vec!["Plant Height: 450 is above the expected maximum of 300 cm".to_string()]
    );
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn import_then_observe_queues_filled_fields() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("field.db");
    let bundle_path = write_bundle(dir.path());

    run_import(&bundle_path, &db_path).await.unwrap();
    run_observe(
        "102",
        Some("T1".to_string()),
        &["Plant Height=88.5".to_string()],
        &db_path,
    )
    .await
    .unwrap();

    let store = FieldStore::open_path(&db_path).await.unwrap();
    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload["plot_id"], json!("p-102"));
    assert_eq!(pending[0].payload["trait_id"], json!("t-height"));
    assert_eq!(pending[0].payload["value"], json!(88.5));
    assert_eq!(pending[0].payload["study_id"], json!("T1"));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn observe_rejects_unknown_plot_and_trait() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("field.db");
    run_import(&write_bundle(dir.path()), &db_path).await.unwrap();

    let missing = run_observe("999", Some("T1".to_string()), &[], &db_path).await;
    assert!(matches!(missing, Err(CliError::PlotNotFound(code)) if code == "999"));

    let unknown_trait = run_observe(
        "p-101",
        None,
        &["Leaf Color=green".to_string()],
        &db_path,
    )
    .await;
    assert!(matches!(
        unknown_trait,
        Err(CliError::Core(fieldsync_core::Error::InvalidInput(_)))
    ));

    let store = FieldStore::open_path(&db_path).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn dead_letter_commands_requeue_and_discard() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("field.db");

    let (first, second) = {
        let store = FieldStore::open_path(&db_path).await.unwrap();
        let first = store
            .enqueue(NewSyncAction::create_observation(json!({ "n": 1 })))
            .await
            .unwrap();
        let second = store
            .enqueue(NewSyncAction::create_observation(json!({ "n": 2 })))
            .await
            .unwrap();
        store.dead_letter(&first.id, "HTTP 422").await.unwrap();
        store.dead_letter(&second.id, "HTTP 422").await.unwrap();
        (first.id, second.id)
    };

    run_dead_letter(
        DeadLetterCommands::Retry {
            id: first.to_string(),
        },
        &db_path,
    )
    .await
    .unwrap();
    run_dead_letter(
        DeadLetterCommands::Discard {
            id: second.to_string(),
        },
        &db_path,
    )
    .await
    .unwrap();

    let store = FieldStore::open_path(&db_path).await.unwrap();
    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first);
    assert!(store.list_dead_letters().await.unwrap().is_empty());

    let invalid = run_dead_letter(
        DeadLetterCommands::Retry {
            id: "nope".to_string(),
        },
        &db_path,
    )
    .await;
    assert!(matches!(invalid, Err(CliError::InvalidActionId(_))));
}
