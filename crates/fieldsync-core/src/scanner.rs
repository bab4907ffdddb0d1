//! Scan resolution
//!
//! Turns the string produced by a barcode/QR scanner (or typed by hand)
//! into a plot from the local store. Resolution never touches the network
//! or the sync queue.

use crate::error::Result;
use crate::models::Plot;
use crate::store::LocalStore;

/// Result of resolving a scanned code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The code matched a plot id exactly
    ById(Plot),
    /// The code parsed as a plot number and matched one plot
    ByNumber(Plot),
    /// Nothing matched; the user should rescan or enter a different code
    NotFound { code: String },
}

impl ScanOutcome {
    /// The resolved plot, if any
    pub const fn plot(&self) -> Option<&Plot> {
        match self {
            Self::ById(plot) | Self::ByNumber(plot) => Some(plot),
            Self::NotFound { .. } => None,
        }
    }

    pub fn into_plot(self) -> Option<Plot> {
        match self {
            Self::ById(plot) | Self::ByNumber(plot) => Some(plot),
            Self::NotFound { .. } => None,
        }
    }
}

/// Resolve a scanned code to a plot
///
/// Lookup order: exact plot id, then plot number (scoped to
/// `active_trial` when given). Keyboard-wedge scanners append newlines,
/// so surrounding whitespace is trimmed first.
///
/// # Errors
///
/// Storage failures, and [`crate::Error::AmbiguousPlotNumber`] when no
/// trial is active and several trials share the scanned number.
pub async fn resolve_scan<S: LocalStore>(
    store: &S,
    code: &str,
    active_trial: Option<&str>,
) -> Result<ScanOutcome> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(ScanOutcome::NotFound {
            code: String::new(),
        });
    }

    if let Some(plot) = store.get_plot(code).await? {
        tracing::debug!(plot_id = %plot.id, "Scan matched plot id");
        return Ok(ScanOutcome::ById(plot));
    }

    if let Ok(number) = code.parse::<i64>() {
        if let Some(plot) = store.find_plot_by_number(active_trial, number).await? {
            tracing::debug!(plot_id = %plot.id, number, "Scan matched plot number");
            return Ok(ScanOutcome::ByNumber(plot));
        }
    }

    tracing::debug!(code, "Scan did not match any plot");
    Ok(ScanOutcome::NotFound {
        code: code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FieldStore;
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn plot(id: &str, trial_id: &str, plot_number: i64) -> Plot {
        Plot {
            id: id.to_string(),
            trial_id: trial_id.to_string(),
            plot_number,
            accession_name: "IR64".to_string(),
        }
    }

    async fn seeded() -> FieldStore {
        let store = FieldStore::open_in_memory().await.unwrap();
        store
            .upsert_plots(&[
                plot("abc123", "T1", 7),
                plot("def456", "T1", 8),
                plot("ghi789", "T2", 8),
                // An id that is itself numeric must win over plot-number lookup.
                plot("42", "T2", 1),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exact_id_match() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "abc123", None).await.unwrap();
        assert_eq!(outcome, ScanOutcome::ById(plot("abc123", "T1", 7)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trailing_newline_is_trimmed() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "abc123\r\n", None).await.unwrap();
        assert_eq!(outcome.plot().map(|p| p.id.as_str()), Some("abc123"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn numeric_fallback_unique_across_trials() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "7", None).await.unwrap();
        assert_eq!(outcome, ScanOutcome::ByNumber(plot("abc123", "T1", 7)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn numeric_fallback_scoped_to_active_trial() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "8", Some("T2")).await.unwrap();
        assert_eq!(outcome, ScanOutcome::ByNumber(plot("ghi789", "T2", 8)));

        let outcome = resolve_scan(&store, "7", Some("T2")).await.unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::NotFound {
                code: "7".to_string()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ambiguous_number_without_active_trial() {
        let store = seeded().await;
        let err = resolve_scan(&store, "8", None).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousPlotNumber { number: 8, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn numeric_id_wins_over_plot_number() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "42", None).await.unwrap();
        assert_eq!(outcome, ScanOutcome::ById(plot("42", "T2", 1)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_code_is_not_found_and_leaves_queue_alone() {
        let store = seeded().await;
        let outcome = resolve_scan(&store, "zzz", None).await.unwrap();
        assert_eq!(outcome.into_plot(), None);

        let blank = resolve_scan(&store, "   ", None).await.unwrap();
        assert!(matches!(blank, ScanOutcome::NotFound { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
