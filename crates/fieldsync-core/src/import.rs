//! Metadata bundle import
//!
//! Plots and traits normally arrive through a server pull. Until that pull
//! runs on the device, a JSON bundle of the same shape can be loaded
//! directly:
//!
//! ```json
//! { "plots": [{ "id": "abc123", "trial_id": "T1", "plot_number": 7, "accession_name": "IR64" }],
//!   "traits": [{ "id": "t1", "trial_id": "T1", "name": "Plant Height", "unit": "cm",
//!                "data_type": "Numeric", "min": 0, "max": 300 }] }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Plot, Trait};

/// Plots and traits replicated from the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBundle {
    #[serde(default)]
    pub plots: Vec<Plot>,
    #[serde(default)]
    pub traits: Vec<Trait>,
}

/// Rows written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub plots: usize,
    pub traits: usize,
}

impl MetadataBundle {
    /// Parse and validate a bundle from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(text)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Read a bundle file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject bundles the store would only partially accept
    pub fn validate(&self) -> Result<()> {
        let mut numbers = HashSet::new();
        for plot in &self.plots {
            if plot.id.trim().is_empty() || plot.trial_id.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "plot {} is missing an id or trial id",
                    plot.plot_number
                )));
            }
            if !numbers.insert((plot.trial_id.as_str(), plot.plot_number)) {
                return Err(Error::InvalidInput(format!(
                    "plot number {} appears twice in trial {}",
                    plot.plot_number, plot.trial_id
                )));
            }
        }

        for item in &self.traits {
            if item.id.trim().is_empty() || item.trial_id.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "trait '{}' is missing an id or trial id",
                    item.name
                )));
            }
            if item.name.trim().is_empty() {
                return Err(Error::InvalidInput(format!("trait {} has no name", item.id)));
            }
            if let (Some(min), Some(max)) = (item.min, item.max) {
                if min > max {
                    return Err(Error::InvalidInput(format!(
                        "trait {} has min {min} above max {max}",
                        item.id
                    )));
                }
            }
        }

        Ok(())
    }
}
