//! Plot repository implementation

use crate::error::Result;
use crate::models::Plot;
use libsql::{params, Connection, Row};

use super::in_transaction;

/// Trait for plot storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PlotRepository {
    /// Get a plot by its exact identifier
    async fn get(&self, id: &str) -> Result<Option<Plot>>;

    /// Find plots with the given number, optionally scoped to a trial
    async fn find_by_number(&self, trial_id: Option<&str>, number: i64) -> Result<Vec<Plot>>;

    /// List all plots of a trial ordered by plot number
    async fn list_by_trial(&self, trial_id: &str) -> Result<Vec<Plot>>;

    /// Insert or replace replicated plots in one transaction
    async fn upsert_all(&self, plots: &[Plot]) -> Result<usize>;
}

/// libSQL implementation of `PlotRepository`
pub struct LibSqlPlotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPlotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_plot(row: &Row) -> Result<Plot> {
        Ok(Plot {
            id: row.get(0)?,
            trial_id: row.get(1)?,
            plot_number: row.get(2)?,
            accession_name: row.get(3)?,
        })
    }

    async fn collect(mut rows: libsql::Rows) -> Result<Vec<Plot>> {
        let mut plots = Vec::new();
        while let Some(row) = rows.next().await? {
            plots.push(Self::parse_plot(&row)?);
        }
        Ok(plots)
    }
}

impl PlotRepository for LibSqlPlotRepository<'_> {
    async fn get(&self, id: &str) -> Result<Option<Plot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, trial_id, plot_number, accession_name FROM plots WHERE id = ?",
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_plot(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_number(&self, trial_id: Option<&str>, number: i64) -> Result<Vec<Plot>> {
        let rows = if let Some(trial_id) = trial_id {
            self.conn
                .query(
                    "SELECT id, trial_id, plot_number, accession_name
                     FROM plots
                     WHERE trial_id = ? AND plot_number = ?",
                    params![trial_id, number],
                )
                .await?
        } else {
            self.conn
                .query(
                    "SELECT id, trial_id, plot_number, accession_name
                     FROM plots
                     WHERE plot_number = ?
                     ORDER BY trial_id ASC",
                    params![number],
                )
                .await?
        };

        Self::collect(rows).await
    }

    async fn list_by_trial(&self, trial_id: &str) -> Result<Vec<Plot>> {
        let rows = self
            .conn
            .query(
                "SELECT id, trial_id, plot_number, accession_name
                 FROM plots
                 WHERE trial_id = ?
                 ORDER BY plot_number ASC",
                [trial_id],
            )
            .await?;

        Self::collect(rows).await
    }

    async fn upsert_all(&self, plots: &[Plot]) -> Result<usize> {
        in_transaction(self.conn, || async move { self.write_all(plots).await }).await
    }
}

impl LibSqlPlotRepository<'_> {
    /// Upsert without opening a transaction; callers own the transaction
    pub(crate) async fn write_all(&self, plots: &[Plot]) -> Result<usize> {
        for plot in plots {
            self.conn
                .execute(
                    "INSERT INTO plots (id, trial_id, plot_number, accession_name)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                         trial_id = excluded.trial_id,
                         plot_number = excluded.plot_number,
                         accession_name = excluded.accession_name",
                    params![
                        plot.id.as_str(),
                        plot.trial_id.as_str(),
                        plot.plot_number,
                        plot.accession_name.as_str()
                    ],
                )
                .await?;
        }
        Ok(plots.len())
    }
}
