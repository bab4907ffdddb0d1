//! Database layer for fieldsync

mod connection;
mod migrations;
mod plot_repository;
mod queue_repository;
mod settings_repository;
mod trait_repository;

pub use connection::Database;
pub use plot_repository::{LibSqlPlotRepository, PlotRepository};
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
pub use trait_repository::{LibSqlTraitRepository, TraitRepository};

use libsql::{Row, Value};

use crate::error::{Error, Result};

/// Bind an optional text column
pub(crate) fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

/// Bind an optional real column
pub(crate) fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

/// Read a nullable text column
pub(crate) fn get_opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

/// Read a nullable real column (integers are widened)
#[allow(clippy::cast_precision_loss)]
pub(crate) fn get_opt_real(row: &Row, idx: i32) -> Result<Option<f64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Real(real) => Ok(Some(real)),
        Value::Integer(integer) => Ok(Some(integer as f64)),
        other => Err(Error::Database(format!(
            "expected number in column {idx}, found {other:?}"
        ))),
    }
}

/// Read a nullable integer column
pub(crate) fn get_opt_integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(integer) => Ok(Some(integer)),
        other => Err(Error::Database(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}

/// Run statements inside one transaction, rolling back on the first failure
pub(crate) async fn in_transaction<F, Fut, T>(conn: &libsql::Connection, body: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

    let value = match body().await {
        Ok(value) => value,
        Err(e) => {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }
    };

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(value)
}
