use std::path::Path;

use fieldsync_core::scanner::{resolve_scan, ScanOutcome};

use crate::commands::common::{open_store, resolve_active_trial};
use crate::error::CliError;

pub async fn run_scan(
    code: &str,
    trial: Option<String>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let active_trial = resolve_active_trial(trial, &store).await?;
    let outcome = resolve_scan(&store, code, active_trial.as_deref()).await?;

    let (matched_by, plot) = match outcome {
        ScanOutcome::ById(plot) => ("id", plot),
        ScanOutcome::ByNumber(plot) => ("plot_number", plot),
        ScanOutcome::NotFound { code } => return Err(CliError::PlotNotFound(code)),
    };

    if as_json {
        let body = serde_json::json!({ "matched_by": matched_by, "plot": plot });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}  [{}]", plot.label(), plot.id);
    }
    Ok(())
}
