use std::path::Path;

use fieldsync_core::observation::{FormState, InputKind, ObservationForm, SubmitReport};
use fieldsync_core::scanner::resolve_scan;

use crate::commands::common::{open_store, parse_assignment, resolve_active_trial};
use crate::error::CliError;

pub async fn run_observe(
    code: &str,
    trial: Option<String>,
    assignments: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let active_trial = resolve_active_trial(trial, &store).await?;
    let plot = resolve_scan(&store, code, active_trial.as_deref())
        .await?
        .into_plot()
        .ok_or_else(|| CliError::PlotNotFound(code.trim().to_string()))?;

    let mut form = ObservationForm::load(&store, &plot.id).await?;
    println!("{}", form.plot().label());

    if form.state() == FormState::NoTraits {
        println!("No traits are defined for trial '{}'.", plot.trial_id);
        return Ok(());
    }

    if assignments.is_empty() {
        for line in format_form_lines(&form) {
            println!("{line}");
        }
        return Ok(());
    }

    for raw in assignments {
        let (key, value) = parse_assignment(raw)?;
        form.set_value(&key, &value)?;
    }

    for warning in form_advisories(&form) {
        eprintln!("warning: {warning}");
    }

    let report = form.submit(&store).await;
    print_submit_report(&report);

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::IncompleteSubmit {
            failed: report.failed.len(),
            attempted: report.failed.len() + report.saved.len(),
        })
    }
}

pub fn format_form_lines(form: &ObservationForm) -> Vec<String> {
    form.fields()
        .iter()
        .map(|field| {
            let kind = match field.kind() {
                InputKind::Numeric => "numeric",
                InputKind::Text => "text",
            };
            format!(
                "  {:<24}  {kind:<7}  {}  ({})",
                field.label(),
                field.placeholder(),
                field.definition.id
            )
        })
        .collect()
}

pub fn form_advisories(form: &ObservationForm) -> Vec<String> {
    form.fields()
        .iter()
        .filter_map(|field| {
            field
                .advisory()
                .map(|advisory| format!("{}: {advisory}", field.definition.name))
        })
        .collect()
}

fn print_submit_report(report: &SubmitReport) {
    if report.is_empty() {
        println!("Nothing to save; every field is blank.");
        return;
    }

    for saved in &report.saved {
        println!("  queued {}  {}", saved.trait_id, saved.action_id);
    }
    for failed in &report.failed {
        eprintln!("  failed {}: {}", failed.trait_name, failed.error);
    }
    println!(
        "Saved {} observation(s), {} failed, {} blank",
        report.saved.len(),
        report.failed.len(),
        report.skipped
    );
}
