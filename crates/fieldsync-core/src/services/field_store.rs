//! Shared store service wrapper used by the CLI and the sync service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{
    in_transaction, Database, LibSqlPlotRepository, LibSqlQueueRepository,
    LibSqlSettingsRepository, LibSqlTraitRepository, PlotRepository, QueueRepository,
    SettingsRepository, TraitRepository,
};
use crate::import::{ImportSummary, MetadataBundle};
use crate::models::{
    ActionId, NewSyncAction, PendingSyncAction, Plot, QueueStats, Settings, SyncRun, Trait,
};
use crate::store::{LocalStore, QueueWriter};
use crate::{Error, Result};

/// Thread-safe service for DB and repository operations.
///
/// Every operation takes the connection lock, so enqueues and queue
/// mutations are serialized. Each queue mutation bumps a revision on a
/// `watch` channel shared by all clones.
#[derive(Clone)]
pub struct FieldStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    revision: Arc<watch::Sender<u64>>,
}

impl FieldStore {
    /// Open a store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %db_path.display(), "Opening field store");
        let db = Database::open(&db_path).await?;
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            revision: Arc::new(revision),
        }
    }

    fn publish_queue_change(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Fetch a queued action in either state.
    pub async fn get_action(&self, id: &ActionId) -> Result<Option<PendingSyncAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.get(id).await
    }

    /// Actions parked after a durable rejection, oldest first.
    pub async fn list_dead_letters(&self) -> Result<Vec<PendingSyncAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_dead_letters().await
    }

    /// Move a dead letter back to the tail of the pending queue.
    pub async fn requeue_dead_letter(&self, id: &ActionId) -> Result<PendingSyncAction> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let requeued = repo.requeue(id).await?;
        drop(db);
        self.publish_queue_change();
        Ok(requeued)
    }

    /// Permanently drop a dead letter.
    pub async fn discard(&self, id: &ActionId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.discard(id).await?;
        drop(db);
        self.publish_queue_change();
        Ok(())
    }

    /// Drain runs newest-first.
    pub async fn list_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_runs(limit).await
    }

    /// Plots of a trial ordered by plot number.
    pub async fn list_plots_for_trial(&self, trial_id: &str) -> Result<Vec<Plot>> {
        let db = self.db.lock().await;
        let repo = LibSqlPlotRepository::new(db.connection());
        repo.list_by_trial(trial_id).await
    }

    /// Insert or update replicated plots.
    pub async fn upsert_plots(&self, plots: &[Plot]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlPlotRepository::new(db.connection());
        repo.upsert_all(plots).await
    }

    /// Insert or update replicated traits.
    pub async fn upsert_traits(&self, traits: &[Trait]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlTraitRepository::new(db.connection());
        repo.upsert_all(traits).await
    }

    /// Write a validated bundle in one transaction.
    pub async fn import_metadata(&self, bundle: &MetadataBundle) -> Result<ImportSummary> {
        bundle.validate()?;

        let db = self.db.lock().await;
        let conn = db.connection();
        let plots = LibSqlPlotRepository::new(conn);
        let traits = LibSqlTraitRepository::new(conn);

        let summary = in_transaction(conn, || async move {
            Ok(ImportSummary {
                plots: plots.write_all(&bundle.plots).await?,
                traits: traits.write_all(&bundle.traits).await?,
            })
        })
        .await?;

        tracing::info!(
            plots = summary.plots,
            traits = summary.traits,
            "Imported field metadata"
        );
        Ok(summary)
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.save(settings).await
    }
}

impl QueueWriter for FieldStore {
    async fn enqueue(&self, action: NewSyncAction) -> Result<PendingSyncAction> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let queued = repo.enqueue(&action).await?;
        drop(db);
        self.publish_queue_change();
        Ok(queued)
    }
}

impl LocalStore for FieldStore {
    async fn get_plot(&self, id: &str) -> Result<Option<Plot>> {
        let db = self.db.lock().await;
        let repo = LibSqlPlotRepository::new(db.connection());
        repo.get(id).await
    }

    async fn find_plot_by_number(
        &self,
        trial_id: Option<&str>,
        number: i64,
    ) -> Result<Option<Plot>> {
        let mut matches = {
            let db = self.db.lock().await;
            let repo = LibSqlPlotRepository::new(db.connection());
            repo.find_by_number(trial_id, number).await?
        };

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(Error::AmbiguousPlotNumber {
                number,
                trials: matches.into_iter().map(|plot| plot.trial_id).collect(),
            }),
        }
    }

    async fn list_traits_for_trial(&self, trial_id: &str) -> Result<Vec<Trait>> {
        let db = self.db.lock().await;
        let repo = LibSqlTraitRepository::new(db.connection());
        repo.list_for_trial(trial_id).await
    }

    async fn list_pending(&self) -> Result<Vec<PendingSyncAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_pending().await
    }

    async fn remove(&self, id: &ActionId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.remove(id).await?;
        drop(db);
        self.publish_queue_change();
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.count_pending().await
    }

    async fn record_failure(&self, id: &ActionId, message: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.record_failure(id, message).await
    }

    async fn dead_letter(&self, id: &ActionId, message: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.dead_letter(id, message).await?;
        drop(db);
        self.publish_queue_change();
        Ok(())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.stats().await
    }

    async fn record_sync_run(&self, run: SyncRun) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.record_run(&run).await.map(|_| ())
    }

    async fn last_sync_run(&self) -> Result<Option<SyncRun>> {
        Ok(self.list_sync_runs(1).await?.into_iter().next())
    }

    async fn load_settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.load().await
    }

    fn queue_changes(&self) -> Option<watch::Receiver<u64>> {
        Some(self.revision.subscribe())
    }
}
