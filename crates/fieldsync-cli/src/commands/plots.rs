use std::path::Path;

use fieldsync_core::LocalStore;

use crate::commands::common::{format_plot_line, open_store};
use crate::error::CliError;

pub async fn run_plots(trial_id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let plots = store.list_plots_for_trial(trial_id.trim()).await?;

    if as_json {
        let traits = store.list_traits_for_trial(trial_id.trim()).await?;
        let body = serde_json::json!({ "plots": plots, "traits": traits });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if plots.is_empty() {
        println!("No plots stored for trial '{}'.", trial_id.trim());
        return Ok(());
    }

    for plot in &plots {
        println!("{}", format_plot_line(plot));
    }
    Ok(())
}
