//! Local store seam used by the scanner, the observation form and the sync service.
//!
//! The production implementation is [`crate::services::FieldStore`]; the
//! traits exist so callers can be exercised against failing or
//! instrumented stores.

use std::future::Future;

use tokio::sync::watch;

use crate::error::Result;
use crate::models::{
    ActionId, NewSyncAction, PendingSyncAction, Plot, QueueStats, Settings, SyncRun, Trait,
};

/// Write side of the sync queue
pub trait QueueWriter: Send + Sync {
    /// Durably append an action before any network attempt
    fn enqueue(
        &self,
        action: NewSyncAction,
    ) -> impl Future<Output = Result<PendingSyncAction>> + Send;
}

/// Durable on-device store of plots, traits and queued actions
pub trait LocalStore: QueueWriter {
    /// Exact id lookup
    fn get_plot(&self, id: &str) -> impl Future<Output = Result<Option<Plot>>> + Send;

    /// Plot-number lookup, scoped to a trial when one is supplied
    ///
    /// Fails with [`crate::Error::AmbiguousPlotNumber`] when no trial is
    /// given and several trials share the number.
    fn find_plot_by_number(
        &self,
        trial_id: Option<&str>,
        number: i64,
    ) -> impl Future<Output = Result<Option<Plot>>> + Send;

    fn list_traits_for_trial(
        &self,
        trial_id: &str,
    ) -> impl Future<Output = Result<Vec<Trait>>> + Send;

    /// Pending actions in enqueue order
    fn list_pending(&self) -> impl Future<Output = Result<Vec<PendingSyncAction>>> + Send;

    /// Remove an acknowledged action
    fn remove(&self, id: &ActionId) -> impl Future<Output = Result<()>> + Send;

    /// Number of pending actions
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Note a retryable failure without changing queue position
    fn record_failure(
        &self,
        id: &ActionId,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Park a durably rejected action
    fn dead_letter(&self, id: &ActionId, message: &str)
        -> impl Future<Output = Result<()>> + Send;

    fn queue_stats(&self) -> impl Future<Output = Result<QueueStats>> + Send;

    fn record_sync_run(&self, run: SyncRun) -> impl Future<Output = Result<()>> + Send;

    /// Most recent drain run, if any
    fn last_sync_run(&self) -> impl Future<Output = Result<Option<SyncRun>>> + Send;

    fn load_settings(&self) -> impl Future<Output = Result<Settings>> + Send;

    /// Revision counter bumped after every queue mutation
    ///
    /// `None` when the store cannot report changes; counters are then only
    /// re-read around drains.
    fn queue_changes(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}
