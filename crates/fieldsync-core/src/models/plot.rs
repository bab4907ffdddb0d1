//! Plot model

use serde::{Deserialize, Serialize};

/// A field unit replicated from the server's metadata pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    /// Stable server identifier
    pub id: String,
    /// Owning trial
    pub trial_id: String,
    /// Human-enterable number, unique within the trial
    pub plot_number: i64,
    /// Display label for the genetic entry planted here
    pub accession_name: String,
}

impl Plot {
    /// Short label used in prompts and listings
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "Plot {} ({}) in trial {}",
            self.plot_number, self.accession_name, self.trial_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_includes_number_accession_and_trial() {
        let plot = Plot {
            id: "abc123".to_string(),
            trial_id: "T1".to_string(),
            plot_number: 7,
            accession_name: "IR64".to_string(),
        };
        assert_eq!(plot.label(), "Plot 7 (IR64) in trial T1");
    }
}
