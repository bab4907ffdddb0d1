use std::path::Path;

use fieldsync_core::LocalStore;

use crate::commands::common::{action_to_item, format_action_lines, open_store, ActionListItem};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let actions = store.list_pending().await?;

    if as_json {
        let json_items = actions
            .iter()
            .map(action_to_item)
            .collect::<Vec<ActionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    for line in format_action_lines(&actions) {
        println!("{line}");
    }
    Ok(())
}
