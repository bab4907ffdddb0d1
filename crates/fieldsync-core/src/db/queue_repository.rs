//! Sync queue repository implementation
//!
//! The queue is a single table ordered by an AUTOINCREMENT `seq` column.
//! Rows in the `pending` state form the drain queue; rows in the
//! `dead_letter` state are parked and skipped by the drain.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)] // SQLite uses i64 for counts and LIMIT

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{
    unix_millis_now, ActionId, ActionState, ActionType, EntityType, NewSyncAction,
    PendingSyncAction, QueueStats, SyncRun,
};
use libsql::{params, Connection, Row};

use super::{get_opt_integer, get_opt_text, in_transaction, opt_text};

const ACTION_COLUMNS: &str = "seq, id, action_type, entity_type, payload, enqueued_at, attempts, \
                              last_error, last_attempt_at, state";

/// Trait for sync queue storage operations (async)
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append an action to the tail of the queue
    async fn enqueue(&self, action: &NewSyncAction) -> Result<PendingSyncAction>;

    /// Get an action in any state
    async fn get(&self, id: &ActionId) -> Result<Option<PendingSyncAction>>;

    /// Pending actions in enqueue order
    async fn list_pending(&self) -> Result<Vec<PendingSyncAction>>;

    /// Number of pending actions
    async fn count_pending(&self) -> Result<u64>;

    /// Remove an action after the server acknowledged it
    async fn remove(&self, id: &ActionId) -> Result<()>;

    /// Record a failed attempt and keep the action pending
    async fn record_failure(&self, id: &ActionId, message: &str) -> Result<()>;

    /// Park an action the server durably rejected
    async fn dead_letter(&self, id: &ActionId, message: &str) -> Result<()>;

    /// Parked actions, oldest first
    async fn list_dead_letters(&self) -> Result<Vec<PendingSyncAction>>;

    /// Move a parked action back to the tail of the pending queue
    async fn requeue(&self, id: &ActionId) -> Result<PendingSyncAction>;

    /// Delete a parked action for good
    async fn discard(&self, id: &ActionId) -> Result<()>;

    /// Queue counters
    async fn stats(&self) -> Result<QueueStats>;

    /// Append a drain run to the history
    async fn record_run(&self, run: &SyncRun) -> Result<i64>;

    /// Most recent drain runs, newest first
    async fn list_runs(&self, limit: usize) -> Result<Vec<SyncRun>>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_action(row: &Row) -> Result<PendingSyncAction> {
        let id: String = row.get(1)?;
        let action_type: String = row.get(2)?;
        let entity_type: String = row.get(3)?;
        let payload: String = row.get(4)?;
        let state: String = row.get(9)?;

        Ok(PendingSyncAction {
            sequence: row.get(0)?,
            id: ActionId::from_str(&id)
                .map_err(|e| Error::Database(format!("invalid action id '{id}': {e}")))?,
            action_type: ActionType::from_str(&action_type)?,
            entity_type: EntityType::from_str(&entity_type)?,
            payload: serde_json::from_str(&payload)?,
            enqueued_at: row.get(5)?,
            attempts: row.get(6)?,
            last_error: get_opt_text(row, 7)?,
            last_attempt_at: get_opt_integer(row, 8)?,
            state: ActionState::from_str(&state)?,
        })
    }

    async fn query_actions(&self, state: ActionState) -> Result<Vec<PendingSyncAction>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM sync_queue WHERE state = ? ORDER BY seq ASC"
                ),
                [state.as_str()],
            )
            .await?;

        let mut actions = Vec::new();
        while let Some(row) = rows.next().await? {
            actions.push(Self::parse_action(&row)?);
        }
        Ok(actions)
    }

    async fn insert(&self, action: &NewSyncAction, enqueued_at: i64) -> Result<i64> {
        let payload = serde_json::to_string(&action.payload)?;
        self.conn
            .execute(
                "INSERT INTO sync_queue (id, action_type, entity_type, payload, enqueued_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    action.id.as_str(),
                    action.action_type.as_str(),
                    action.entity_type.as_str(),
                    payload,
                    enqueued_at
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn require(&self, id: &ActionId) -> Result<PendingSyncAction> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("queued action {id}")))
    }

    async fn count_state(&self, state: ActionState) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM sync_queue WHERE state = ?",
                [state.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count as u64)
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn enqueue(&self, action: &NewSyncAction) -> Result<PendingSyncAction> {
        let enqueued_at = unix_millis_now();
        let sequence = self.insert(action, enqueued_at).await?;

        tracing::debug!(
            action_id = %action.id,
            sequence,
            entity_type = %action.entity_type,
            "Enqueued sync action"
        );

        Ok(PendingSyncAction {
            id: action.id,
            sequence,
            action_type: action.action_type,
            entity_type: action.entity_type,
            payload: action.payload.clone(),
            enqueued_at,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            state: ActionState::Pending,
        })
    }

    async fn get(&self, id: &ActionId) -> Result<Option<PendingSyncAction>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ACTION_COLUMNS} FROM sync_queue WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_action(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> Result<Vec<PendingSyncAction>> {
        self.query_actions(ActionState::Pending).await
    }

    async fn count_pending(&self) -> Result<u64> {
        self.count_state(ActionState::Pending).await
    }

    async fn remove(&self, id: &ActionId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", [id.as_str()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("queued action {id}")));
        }
        Ok(())
    }

    async fn record_failure(&self, id: &ActionId, message: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue
                 SET attempts = attempts + 1, last_error = ?, last_attempt_at = ?
                 WHERE id = ?",
                params![message, unix_millis_now(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("queued action {id}")));
        }
        Ok(())
    }

    async fn dead_letter(&self, id: &ActionId, message: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue
                 SET state = ?, attempts = attempts + 1, last_error = ?, last_attempt_at = ?
                 WHERE id = ? AND state = ?",
                params![
                    ActionState::DeadLetter.as_str(),
                    message,
                    unix_millis_now(),
                    id.as_str(),
                    ActionState::Pending.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("pending action {id}")));
        }
        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<PendingSyncAction>> {
        self.query_actions(ActionState::DeadLetter).await
    }

    async fn requeue(&self, id: &ActionId) -> Result<PendingSyncAction> {
        let parked = self.require(id).await?;
        if parked.is_pending() {
            return Err(Error::InvalidInput(format!(
                "action {id} is already pending"
            )));
        }

        // Delete and re-insert so the action gets a fresh sequence at the tail.
        let action = NewSyncAction {
            id: parked.id,
            action_type: parked.action_type,
            entity_type: parked.entity_type,
            payload: parked.payload,
        };
        in_transaction(self.conn, || async move {
            self.conn
                .execute("DELETE FROM sync_queue WHERE id = ?", [id.as_str()])
                .await?;
            self.insert(&action, unix_millis_now()).await
        })
        .await?;

        tracing::info!(action_id = %id, "Requeued dead-lettered action");
        self.require(id).await
    }

    async fn discard(&self, id: &ActionId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM sync_queue WHERE id = ? AND state = ?",
                params![id.as_str(), ActionState::DeadLetter.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("dead-lettered action {id}")));
        }
        tracing::warn!(action_id = %id, "Discarded dead-lettered action");
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let pending = self.count_state(ActionState::Pending).await?;
        let dead_letter = self.count_state(ActionState::DeadLetter).await?;

        let mut rows = self
            .conn
            .query(
                "SELECT MIN(enqueued_at) FROM sync_queue WHERE state = ?",
                [ActionState::Pending.as_str()],
            )
            .await?;
        let oldest_pending_at = match rows.next().await? {
            Some(row) => get_opt_integer(&row, 0)?,
            None => None,
        };

        Ok(QueueStats {
            pending,
            dead_letter,
            oldest_pending_at,
        })
    }

    async fn record_run(&self, run: &SyncRun) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO sync_history (started_at, finished_at, synced, dead_lettered, error)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    run.started_at,
                    run.finished_at,
                    run.synced,
                    run.dead_lettered,
                    opt_text(run.error.as_deref())
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, synced, dead_lettered, error
                 FROM sync_history
                 ORDER BY id DESC
                 LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(SyncRun {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                synced: row.get(3)?,
                dead_lettered: row.get(4)?,
                error: get_opt_text(&row, 5)?,
            });
        }
        Ok(runs)
    }
}
