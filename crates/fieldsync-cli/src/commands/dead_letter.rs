use std::path::Path;

use crate::cli::DeadLetterCommands;
use crate::commands::common::{
    action_to_item, format_action_lines, open_store, parse_action_id, ActionListItem,
};
use crate::error::CliError;

pub async fn run_dead_letter(command: DeadLetterCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        DeadLetterCommands::List { json } => run_dead_letter_list(json, db_path).await,
        DeadLetterCommands::Retry { id } => run_dead_letter_retry(&id, db_path).await,
        DeadLetterCommands::Discard { id } => run_dead_letter_discard(&id, db_path).await,
    }
}

async fn run_dead_letter_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let actions = store.list_dead_letters().await?;

    if as_json {
        let json_items = actions
            .iter()
            .map(action_to_item)
            .collect::<Vec<ActionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("No rejected actions.");
        return Ok(());
    }

    for line in format_action_lines(&actions) {
        println!("{line}");
    }
    Ok(())
}

async fn run_dead_letter_retry(id: &str, db_path: &Path) -> Result<(), CliError> {
    let action_id = parse_action_id(id)?;
    let store = open_store(db_path).await?;
    let action = store.requeue_dead_letter(&action_id).await?;

    println!("Requeued {} at position {}", action.id, action.sequence);
    Ok(())
}

async fn run_dead_letter_discard(id: &str, db_path: &Path) -> Result<(), CliError> {
    let action_id = parse_action_id(id)?;
    let store = open_store(db_path).await?;
    store.discard(&action_id).await?;

    println!("Discarded {action_id}");
    Ok(())
}
