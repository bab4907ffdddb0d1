//! Queue drain and auto-sync loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use super::connectivity::Connectivity;
use super::transport::{SyncTransport, TransportError};
use crate::models::{unix_millis_now, ActionId, PendingSyncAction, SyncRun};
use crate::store::LocalStore;

/// What a durable server rejection does to the drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Park the action as a dead letter and keep draining
    #[default]
    DeadLetter,
    /// Leave the action at the head of the queue and stop
    Halt,
}

/// Drain tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on one send, independent of the transport's own timeout
    pub send_timeout: Duration,
    pub rejection_policy: RejectionPolicy,
    /// First auto-sync retry delay after a transient failure
    pub retry_base: Duration,
    /// Cap for the doubling retry delay
    pub retry_max: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(15),
            rejection_policy: RejectionPolicy::DeadLetter,
            retry_base: Duration::from_secs(5),
            retry_max: Duration::from_secs(300),
        }
    }
}

impl SyncOptions {
    /// Delay before retry number `attempt` (zero-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }
}

/// Read-only observables for front ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: u64,
    pub dead_letter_count: u64,
    /// Failure that stopped the most recent drain
    pub last_error: Option<String>,
    /// End of the most recent drain that emptied its snapshot (Unix ms)
    pub last_sync_at: Option<i64>,
}

/// Why a drain request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    EmptyQueue,
    AlreadySyncing,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Offline => "device is offline",
            Self::EmptyQueue => "nothing to sync",
            Self::AlreadySyncing => "a sync is already running",
        })
    }
}

/// The item a drain stopped on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltReason {
    pub action_id: ActionId,
    pub error: String,
    /// Whether trying again later may succeed without user action
    pub retryable: bool,
}

/// Result of one drain run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub dead_lettered: usize,
    /// Pending actions left after the run
    pub remaining: u64,
    pub halted: Option<HaltReason>,
}

impl DrainReport {
    pub const fn is_clean(&self) -> bool {
        self.halted.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Skipped(SkipReason),
    Finished(DrainReport),
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store failed; the drain stopped without losing queued data
    #[error("Local store failed during sync: {0}")]
    Store(#[from] crate::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Clears the drain flag however the drain ends
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Replays the local queue against the server
///
/// One drain runs at a time and sends one action at a time, in queue
/// order. An action leaves the queue only after the transport reports
/// success, so delivery is at-least-once.
pub struct SyncService<S, T> {
    store: S,
    transport: T,
    connectivity: Connectivity,
    options: SyncOptions,
    draining: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl<S: LocalStore, T: SyncTransport> SyncService<S, T> {
    pub fn new(store: S, transport: T, connectivity: Connectivity, options: SyncOptions) -> Self {
        let (status, _rx) = watch::channel(SyncStatus {
            is_online: connectivity.is_online(),
            ..SyncStatus::default()
        });
        Self {
            store,
            transport,
            connectivity,
            options,
            draining: AtomicBool::new(false),
            status,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        let mut status = self.status.borrow().clone();
        status.is_online = self.connectivity.is_online();
        status
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Re-read queue counters from the store
    pub async fn refresh_status(&self) -> SyncResult<SyncStatus> {
        let stats = self.store.queue_stats().await?;
        let cached = self.status.borrow().last_sync_at;
        let last_sync_at = match cached {
            Some(at) => Some(at),
            None => self
                .store
                .last_sync_run()
                .await?
                .filter(SyncRun::succeeded)
                .map(|run| run.finished_at),
        };
        let online = self.connectivity.is_online();

        self.status.send_modify(|status| {
            status.is_online = online;
            status.pending_count = stats.pending;
            status.dead_letter_count = stats.dead_letter;
            status.last_sync_at = last_sync_at;
        });
        Ok(self.status())
    }

    /// Drain the queue now
    ///
    /// Skips when offline, when the queue is empty, or when another drain is
    /// running. Transport failures end the run with a [`HaltReason`]; only
    /// local store failures are returned as errors.
    pub async fn sync_now(&self) -> SyncResult<DrainOutcome> {
        if !self.connectivity.is_online() {
            self.status.send_modify(|status| status.is_online = false);
            return Ok(DrainOutcome::Skipped(SkipReason::Offline));
        }

        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            return Ok(DrainOutcome::Skipped(SkipReason::AlreadySyncing));
        };

        let pending = self.store.list_pending().await?;
        if pending.is_empty() {
            self.refresh_status().await?;
            return Ok(DrainOutcome::Skipped(SkipReason::EmptyQueue));
        }

        tracing::info!(pending = pending.len(), "Starting sync drain");
        self.status.send_modify(|status| {
            status.is_online = true;
            status.is_syncing = true;
        });

        let started_at = unix_millis_now();
        let drained = self.drain(pending).await;
        let finished_at = unix_millis_now();

        self.status.send_modify(|status| status.is_syncing = false);

        let report = match drained {
            Ok(report) => report,
            Err(error) => {
                tracing::error!("Sync drain stopped by local store failure: {error}");
                self.status
                    .send_modify(|status| status.last_error = Some(error.to_string()));
                return Err(error);
            }
        };

        let run = SyncRun {
            id: 0,
            started_at,
            finished_at,
            synced: i64::try_from(report.synced).unwrap_or(i64::MAX),
            dead_lettered: i64::try_from(report.dead_lettered).unwrap_or(i64::MAX),
            error: report.halted.as_ref().map(|halt| halt.error.clone()),
        };
        if let Err(error) = self.store.record_sync_run(run).await {
            tracing::warn!("Failed to record sync run: {error}");
        }

        self.status.send_modify(|status| match &report.halted {
            Some(halt) => status.last_error = Some(halt.error.clone()),
            None => {
                status.last_error = None;
                status.last_sync_at = Some(finished_at);
            }
        });
        let status = self.refresh_status().await?;

        let report = DrainReport {
            remaining: status.pending_count,
            ..report
        };
        tracing::info!(
            synced = report.synced,
            dead_lettered = report.dead_lettered,
            remaining = report.remaining,
            halted = report.halted.is_some(),
            "Sync drain finished"
        );
        Ok(DrainOutcome::Finished(report))
    }

    async fn drain(&self, pending: Vec<PendingSyncAction>) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();

        for action in pending {
            if !self.connectivity.is_online() {
                tracing::info!(action_id = %action.id, "Connectivity lost; stopping drain");
                report.halted = Some(HaltReason {
                    action_id: action.id,
                    error: "connectivity lost during sync".to_string(),
                    retryable: true,
                });
                break;
            }

            match self.send(&action).await {
                Ok(()) => {
                    self.store.remove(&action.id).await?;
                    report.synced += 1;
                    self.status.send_modify(|status| {
                        status.pending_count = status.pending_count.saturating_sub(1);
                    });
                    tracing::debug!(action_id = %action.id, sequence = action.sequence, "Synced action");
                }
                Err(error)
                    if error.is_rejection()
                        && self.options.rejection_policy == RejectionPolicy::DeadLetter =>
                {
                    let message = error.to_string();
                    tracing::warn!(action_id = %action.id, "Moving rejected action to dead letters: {message}");
                    self.store.dead_letter(&action.id, &message).await?;
                    report.dead_lettered += 1;
                    self.status.send_modify(|status| {
                        status.pending_count = status.pending_count.saturating_sub(1);
                        status.dead_letter_count += 1;
                    });
                }
                Err(error) => {
                    let message = error.to_string();
                    tracing::warn!(action_id = %action.id, "Sync halted: {message}");
                    self.store.record_failure(&action.id, &message).await?;
                    report.halted = Some(HaltReason {
                        action_id: action.id,
                        error: message,
                        retryable: error.is_retryable(),
                    });
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn send(&self, action: &PendingSyncAction) -> Result<(), TransportError> {
        match tokio::time::timeout(self.options.send_timeout, self.transport.send(action)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.options.send_timeout)),
        }
    }

    async fn auto_sync_enabled(&self) -> bool {
        match self.store.load_settings().await {
            Ok(settings) => settings.auto_sync,
            Err(error) => {
                tracing::warn!("Failed to load settings, assuming auto-sync: {error}");
                true
            }
        }
    }

    /// Auto-sync loop
    ///
    /// Drains at startup when online, on every offline to online
    /// transition, and after transient failures with capped exponential
    /// backoff while still online. Queue counters in the published status
    /// follow store mutations made outside a drain. Returns once `shutdown` flips to `true`
    /// or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();
        let mut queue_rx = self.store.queue_changes();
        if let Err(error) = self.refresh_status().await {
            tracing::warn!("Failed to read queue status: {error}");
        }
        tracing::info!(online = was_online, "Sync service running");

        let mut trigger = was_online;
        let mut attempt: u32 = 0;
        let mut retry_at: Option<Instant> = None;

        loop {
            if trigger {
                trigger = false;
                retry_at = None;
                if self.auto_sync_enabled().await {
                    if self.run_once().await {
                        let delay = self.options.retry_delay(attempt);
                        attempt = attempt.saturating_add(1);
                        tracing::info!(delay_ms = delay.as_millis(), "Scheduling sync retry");
                        retry_at = Some(Instant::now() + delay);
                    } else {
                        attempt = 0;
                    }
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    self.status.send_modify(|status| status.is_online = online);
                    if online && !was_online {
                        attempt = 0;
                        trigger = true;
                    }
                    was_online = online;
                }
                () = sleep_until_retry(retry_at) => {
                    trigger = true;
                }
                changed = queue_changed(&mut queue_rx) => {
                    if changed {
                        if let Err(error) = self.refresh_status().await {
                            tracing::warn!("Failed to read queue status: {error}");
                        }
                    } else {
                        queue_rx = None;
                    }
                }
            }
        }

        tracing::info!("Sync service stopped");
    }

    /// One automatic drain; returns whether a retry should be scheduled
    async fn run_once(&self) -> bool {
        match self.sync_now().await {
            Ok(DrainOutcome::Finished(report)) => report
                .halted
                .as_ref()
                .is_some_and(|halt| halt.retryable && self.connectivity.is_online()),
            Ok(DrainOutcome::Skipped(reason)) => {
                tracing::debug!("Sync skipped: {reason}");
                false
            }
            Err(error) => {
                tracing::error!("Automatic sync failed: {error}");
                self.connectivity.is_online()
            }
        }
    }
}

/// Resolves on the next queue mutation; `false` once the store stops publishing
async fn queue_changed(rx: &mut Option<watch::Receiver<u64>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

async fn sleep_until_retry(retry_at: Option<Instant>) {
    match retry_at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
