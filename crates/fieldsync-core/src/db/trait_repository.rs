//! Trait repository implementation

use crate::error::Result;
use crate::models::{Trait, TraitDataType};
use libsql::{params, Connection, Row};

use super::{get_opt_real, get_opt_text, in_transaction, opt_real, opt_text};

/// Trait for phenotyping-trait storage operations (async)
#[allow(async_fn_in_trait)]
pub trait TraitRepository {
    /// List the traits valid for a trial
    ///
    /// Order follows table iteration and is only meaningful for display.
    async fn list_for_trial(&self, trial_id: &str) -> Result<Vec<Trait>>;

    /// Insert or replace replicated traits in one transaction
    async fn upsert_all(&self, traits: &[Trait]) -> Result<usize>;
}

/// libSQL implementation of `TraitRepository`
pub struct LibSqlTraitRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTraitRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_trait(row: &Row) -> Result<Trait> {
        let data_type: String = row.get(4)?;
        Ok(Trait {
            id: row.get(0)?,
            trial_id: row.get(1)?,
            name: row.get(2)?,
            unit: get_opt_text(row, 3)?,
            data_type: TraitDataType::from(data_type),
            min: get_opt_real(row, 5)?,
            max: get_opt_real(row, 6)?,
        })
    }
}

impl TraitRepository for LibSqlTraitRepository<'_> {
    async fn list_for_trial(&self, trial_id: &str) -> Result<Vec<Trait>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, trial_id, name, unit, data_type, min_value, max_value
                 FROM traits
                 WHERE trial_id = ?",
                [trial_id],
            )
            .await?;

        let mut traits = Vec::new();
        while let Some(row) = rows.next().await? {
            traits.push(Self::parse_trait(&row)?);
        }
        Ok(traits)
    }

    async fn upsert_all(&self, traits: &[Trait]) -> Result<usize> {
        in_transaction(self.conn, || async move { self.write_all(traits).await }).await
    }
}

impl LibSqlTraitRepository<'_> {
    /// Upsert without opening a transaction; callers own the transaction
    pub(crate) async fn write_all(&self, traits: &[Trait]) -> Result<usize> {
        for item in traits {
            self.conn
                .execute(
                    "INSERT INTO traits (id, trial_id, name, unit, data_type, min_value, max_value)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                         trial_id = excluded.trial_id,
                         name = excluded.name,
                         unit = excluded.unit,
                         data_type = excluded.data_type,
                         min_value = excluded.min_value,
                         max_value = excluded.max_value",
                    params![
                        item.id.as_str(),
                        item.trial_id.as_str(),
                        item.name.as_str(),
                        opt_text(item.unit.as_deref()),
                        item.data_type.as_str(),
                        opt_real(item.min),
                        opt_real(item.max)
                    ],
                )
                .await?;
        }
        Ok(traits.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn height(trial_id: &str) -> Trait {
        Trait {
            id: format!("{trial_id}-height"),
            trial_id: trial_id.to_string(),
            name: "Plant Height".to_string(),
            unit: Some("cm".to_string()),
            data_type: TraitDataType::Numeric,
            min: Some(0.0),
            max: Some(300.0),
        }
    }

    fn lodging(trial_id: &str) -> Trait {
        Trait {
            id: format!("{trial_id}-lodging"),
            trial_id: trial_id.to_string(),
            name: "Lodging".to_string(),
            unit: None,
            data_type: TraitDataType::Text,
            min: None,
            max: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_trial_is_scoped() {
        let db = setup().await;
        let repo = LibSqlTraitRepository::new(db.connection());

        repo.upsert_all(&[height("T1"), lodging("T1"), height("T2")])
            .await
            .unwrap();

        let mut traits = repo.list_for_trial("T1").await.unwrap();
        traits.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(traits, vec![height("T1"), lodging("T1")]);

        assert!(repo.list_for_trial("T9").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_optional_columns_round_trip_as_null() {
        let db = setup().await;
        let repo = LibSqlTraitRepository::new(db.connection());

        repo.upsert_all(&[lodging("T1")]).await.unwrap();
        let traits = repo.list_for_trial("T1").await.unwrap();
        assert_eq!(traits[0].unit, None);
        assert_eq!(traits[0].min, None);
        assert_eq!(traits[0].data_type, TraitDataType::Text);
    }
}
