//! Observation entry form
//!
//! Renders one input per trait of a resolved plot's trial and turns the
//! filled-in inputs into queued `CREATE`/`OBSERVATION` actions. Trait
//! bounds are advisory only: nothing typed into a field is ever rejected.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{
    ActionId, NewSyncAction, ObservationPayload, ObservationValue, Plot, Trait,
};
use crate::store::{LocalStore, QueueWriter};

/// Kind of input a trait calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Numeric,
    Text,
}

/// Whether the form has anything to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Ready,
    /// The plot's trial has no traits configured
    NoTraits,
}

/// One input bound to a trait
#[derive(Debug, Clone, PartialEq)]
pub struct TraitField {
    pub definition: Trait,
    /// Raw text as entered
    pub value: String,
}

impl TraitField {
    const fn new(definition: Trait) -> Self {
        Self {
            definition,
            value: String::new(),
        }
    }

    pub const fn kind(&self) -> InputKind {
        if self.definition.is_numeric() {
            InputKind::Numeric
        } else {
            InputKind::Text
        }
    }

    /// Display label, e.g. "Plant Height (cm)"
    pub fn label(&self) -> String {
        match self.definition.unit.as_deref() {
            Some(unit) if !unit.trim().is_empty() => {
                format!("{} ({unit})", self.definition.name)
            }
            _ => self.definition.name.clone(),
        }
    }

    pub fn placeholder(&self) -> String {
        self.definition.placeholder()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Non-blocking hint about the current value
    ///
    /// Numeric fields flag values outside the trait's bounds and input that
    /// will be stored as text. Text fields never produce a hint.
    pub fn advisory(&self) -> Option<String> {
        if self.is_blank() || self.kind() == InputKind::Text {
            return None;
        }

        let unit = self
            .definition
            .unit
            .as_deref()
            .map(|unit| format!(" {unit}"))
            .unwrap_or_default();

        let Some(number) = ObservationValue::parse(&self.value).as_number() else {
            return Some(format!(
                "'{}' is not a number and will be saved as text",
                self.value.trim()
            ));
        };

        if let Some(min) = self.definition.min {
            if number < min {
                return Some(format!("{number} is below the expected minimum of {min}{unit}"));
            }
        }
        if let Some(max) = self.definition.max {
            if number > max {
                return Some(format!("{number} is above the expected maximum of {max}{unit}"));
            }
        }
        None
    }
}

/// A field that was queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedField {
    pub trait_id: String,
    pub action_id: ActionId,
}

/// A field whose enqueue failed; its value stays in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedField {
    pub trait_id: String,
    pub trait_name: String,
    pub error: String,
}

/// Outcome of one submit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub saved: Vec<SavedField>,
    pub failed: Vec<FailedField>,
    /// Blank fields that produced no action
    pub skipped: usize,
}

impl SubmitReport {
    /// Every filled field was queued
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.saved.is_empty()
    }

    /// Nothing was filled in
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

/// Observation entry for one resolved plot
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationForm {
    plot: Plot,
    fields: Vec<TraitField>,
}

impl ObservationForm {
    /// Build the form for an already resolved plot
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the plot is not in the local store, and
    /// storage failures.
    pub async fn load<S: LocalStore>(store: &S, plot_id: &str) -> Result<Self> {
        let plot = store
            .get_plot(plot_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("plot {plot_id}")))?;

        let mut traits = store.list_traits_for_trial(&plot.trial_id).await?;
        traits.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        Ok(Self {
            fields: traits.into_iter().map(TraitField::new).collect(),
            plot,
        })
    }

    pub const fn plot(&self) -> &Plot {
        &self.plot
    }

    pub fn state(&self) -> FormState {
        if self.fields.is_empty() {
            FormState::NoTraits
        } else {
            FormState::Ready
        }
    }

    pub fn fields(&self) -> &[TraitField] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [TraitField] {
        &mut self.fields
    }

    /// Set a field by trait id, or by trait name ignoring case
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when no trait of this plot's trial matches.
    pub fn set_value(&mut self, trait_key: &str, value: &str) -> Result<()> {
        let key = trait_key.trim();
        let index = self
            .fields
            .iter()
            .position(|field| field.definition.id == key)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|field| field.definition.name.eq_ignore_ascii_case(key))
            })
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "trait '{key}' is not configured for trial {}",
                    self.plot.trial_id
                ))
            })?;

        self.fields[index].value = value.to_string();
        Ok(())
    }

    pub fn filled_count(&self) -> usize {
        self.fields.iter().filter(|field| !field.is_blank()).count()
    }

    /// Queue one observation per filled field
    ///
    /// Every filled field is attempted even when another fails. Values are
    /// cleared only when all of them were queued.
    pub async fn submit<W: QueueWriter>(&mut self, writer: &W) -> SubmitReport {
        self.submit_at(writer, Utc::now()).await
    }

    /// [`Self::submit`] with an explicit submission time
    pub async fn submit_at<W: QueueWriter>(
        &mut self,
        writer: &W,
        timestamp: DateTime<Utc>,
    ) -> SubmitReport {
        let mut report = SubmitReport::default();

        for field in &self.fields {
            if field.is_blank() {
                report.skipped += 1;
                continue;
            }

            match self.enqueue_field(writer, field, timestamp).await {
                Ok(action_id) => report.saved.push(SavedField {
                    trait_id: field.definition.id.clone(),
                    action_id,
                }),
                Err(e) => {
                    tracing::warn!(
                        plot_id = %self.plot.id,
                        trait_id = %field.definition.id,
                        "Failed to queue observation: {e}"
                    );
                    report.failed.push(FailedField {
                        trait_id: field.definition.id.clone(),
                        trait_name: field.definition.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.is_complete() {
            for field in &mut self.fields {
                field.value.clear();
            }
        }

        tracing::info!(
            plot_id = %self.plot.id,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Observation form submitted"
        );
        report
    }

    async fn enqueue_field<W: QueueWriter>(
        &self,
        writer: &W,
        field: &TraitField,
        timestamp: DateTime<Utc>,
    ) -> Result<ActionId> {
        let payload = ObservationPayload {
            study_id: self.plot.trial_id.clone(),
            plot_id: self.plot.id.clone(),
            trait_id: field.definition.id.clone(),
            value: ObservationValue::parse(&field.value),
            timestamp,
            notes: String::new(),
        };

        let action = NewSyncAction::create_observation(serde_json::to_value(&payload)?);
        let queued = writer.enqueue(action).await?;
        Ok(queued.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PendingSyncAction, TraitDataType};
    use crate::services::FieldStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn trait_def(id: &str, name: &str, data_type: TraitDataType) -> Trait {
        Trait {
            id: id.to_string(),
            trial_id: "T1".to_string(),
            name: name.to_string(),
            unit: None,
            data_type,
            min: None,
            max: None,
        }
    }

    fn height() -> Trait {
        Trait {
            unit: Some("cm".to_string()),
            min: Some(0.0),
            max: Some(300.0),
            ..trait_def("t1", "Plant Height", TraitDataType::Numeric)
        }
    }

    async fn seeded(traits: &[Trait]) -> FieldStore {
        let store = FieldStore::open_in_memory().await.unwrap();
        store
            .upsert_plots(&[
                Plot {
                    id: "abc123".to_string(),
                    trial_id: "T1".to_string(),
                    plot_number: 7,
                    accession_name: "IR64".to_string(),
                },
                Plot {
                    id: "empty".to_string(),
                    trial_id: "T9".to_string(),
                    plot_number: 1,
                    accession_name: "Check".to_string(),
                },
            ])
            .await
            .unwrap();
        store.upsert_traits(traits).await.unwrap();
        store
    }

    /// Writer that fails for selected trait ids and forwards the rest
    struct FlakyWriter<'a> {
        inner: &'a FieldStore,
        fail_trait: &'static str,
    }

    impl QueueWriter for FlakyWriter<'_> {
        async fn enqueue(&self, action: NewSyncAction) -> Result<PendingSyncAction> {
            if action.payload["trait_id"] == self.fail_trait {
                return Err(Error::Database("disk full".to_string()));
            }
            self.inner.enqueue(action).await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_builds_typed_fields() {
        let store = seeded(&[height(), trait_def("t2", "Lodging", TraitDataType::Text)]).await;
        let form = ObservationForm::load(&store, "abc123").await.unwrap();

        assert_eq!(form.state(), FormState::Ready);
        let kinds: Vec<_> = form.fields().iter().map(TraitField::kind).collect();
        assert_eq!(kinds, vec![InputKind::Text, InputKind::Numeric]);
        assert_eq!(form.fields()[1].label(), "Plant Height (cm)");
        assert_eq!(form.fields()[1].placeholder(), "0 - 300 cm");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_without_traits_is_degenerate_not_error() {
        let store = seeded(&[height()]).await;
        let form = ObservationForm::load(&store, "empty").await.unwrap();
        assert_eq!(form.state(), FormState::NoTraits);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_unknown_plot_is_not_found() {
        let store = seeded(&[height()]).await;
        let err = ObservationForm::load(&store, "missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_queues_only_filled_fields() {
        let traits: Vec<Trait> = (1..=5)
            .map(|i| trait_def(&format!("t{i}"), &format!("Trait {i}"), TraitDataType::Numeric))
            .collect();
        let store = seeded(&traits).await;
        let mut form = ObservationForm::load(&store, "abc123").await.unwrap();

        form.set_value("t2", "12.5").unwrap();
        form.set_value("trait 4", "tall").unwrap();
        let report = form.submit(&store).await;

        assert!(report.is_complete());
        assert_eq!(report.skipped, 3);
        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload["trait_id"], "t2");
        assert_eq!(pending[0].payload["value"], json!(12.5));
        assert_eq!(pending[1].payload["trait_id"], "t4");
        assert_eq!(pending[1].payload["value"], "tall");
        assert_eq!(form.filled_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_submission_builds_observation_payload() {
        let store = seeded(&[height()]).await;
        let mut form = ObservationForm::load(&store, "abc123").await.unwrap();
        form.set_value("t1", "42.5").unwrap();

        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let report = form.submit_at(&store, at).await;
        assert_eq!(report.saved.len(), 1);

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, report.saved[0].action_id);
        assert_eq!(
            pending[0].payload,
            json!({
                "study_id": "T1",
                "plot_id": "abc123",
                "trait_id": "t1",
                "value": 42.5,
                "timestamp": "2023-11-14T22:13:20Z",
                "notes": ""
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn partial_failure_keeps_values_and_attempts_every_field() {
        let store = seeded(&[height(), trait_def("t2", "Lodging", TraitDataType::Text)]).await;
        let mut form = ObservationForm::load(&store, "abc123").await.unwrap();
        form.set_value("t1", "80").unwrap();
        form.set_value("t2", "none").unwrap();

        let writer = FlakyWriter {
            inner: &store,
            fail_trait: "t2",
        };
        let report = form.submit(&writer).await;

        assert!(!report.is_complete());
        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].trait_id, "t2");
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(form.filled_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_form_submits_nothing() {
        let store = seeded(&[height()]).await;
        let mut form = ObservationForm::load(&store, "abc123").await.unwrap();
        form.set_value("t1", "   ").unwrap();

        let report = form.submit(&store).await;
        assert!(report.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_value_rejects_unknown_trait() {
        let store = seeded(&[height()]).await;
        let mut form = ObservationForm::load(&store, "abc123").await.unwrap();
        assert!(matches!(
            form.set_value("yield", "1"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn advisory_flags_but_never_blocks() {
        let mut field = TraitField::new(height());
        assert_eq!(field.advisory(), None);

        field.value = "150".to_string();
        assert_eq!(field.advisory(), None);

        field.value = "350".to_string();
        assert_eq!(
            field.advisory().as_deref(),
            Some("350 is above the expected maximum of 300 cm")
        );

        field.value = "-1".to_string();
        assert!(field.advisory().unwrap().contains("minimum"));

        field.value = "tall".to_string();
        assert!(field.advisory().unwrap().contains("saved as text"));

        let text = TraitField {
            value: "anything".to_string(),
            ..TraitField::new(trait_def("t2", "Lodging", TraitDataType::Text))
        };
        assert_eq!(text.advisory(), None);
    }
}
