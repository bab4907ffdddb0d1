use std::path::Path;

use fieldsync_core::import::MetadataBundle;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_import(bundle_path: &Path, db_path: &Path) -> Result<(), CliError> {
    let bundle = MetadataBundle::from_path(bundle_path)?;
    let store = open_store(db_path).await?;
    let summary = store.import_metadata(&bundle).await?;

    println!(
        "Imported {} plots and {} traits from {}",
        summary.plots,
        summary.traits,
        bundle_path.display()
    );
    Ok(())
}
