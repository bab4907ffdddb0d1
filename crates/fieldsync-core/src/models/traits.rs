//! Phenotyping trait model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value kind a trait records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum TraitDataType {
    /// Numeric measurement
    Numeric,
    /// Anything else (categorical, free text, dates) is captured as text
    #[default]
    Text,
}

impl TraitDataType {
    /// Storage representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Text => "Text",
        }
    }
}

impl fmt::Display for TraitDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TraitDataType {
    fn from(value: String) -> Self {
        Self::from_str(&value).unwrap_or_default()
    }
}

impl From<TraitDataType> for String {
    fn from(value: TraitDataType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for TraitDataType {
    type Err = std::convert::Infallible;

    /// Unknown server data types fall back to text capture.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("numeric") {
            Ok(Self::Numeric)
        } else {
            Ok(Self::Text)
        }
    }
}

/// A measurable variable scoped to a trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    /// Server identifier
    pub id: String,
    /// Trial this trait is valid for
    pub trial_id: String,
    /// Display name (e.g. "Plant Height")
    pub name: String,
    /// Unit of measure, if any
    #[serde(default)]
    pub unit: Option<String>,
    /// Value kind
    #[serde(default)]
    pub data_type: TraitDataType,
    /// Advisory lower bound
    #[serde(default)]
    pub min: Option<f64>,
    /// Advisory upper bound
    #[serde(default)]
    pub max: Option<f64>,
}

impl Trait {
    /// Whether input should use numeric entry
    pub const fn is_numeric(&self) -> bool {
        matches!(self.data_type, TraitDataType::Numeric)
    }

    /// Placeholder guidance built from the advisory bounds
    #[must_use]
    pub fn placeholder(&self) -> String {
        let unit = self.unit.as_deref().map(|unit| format!(" {unit}")).unwrap_or_default();
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{min} - {max}{unit}"),
            (Some(min), None) => format!(">= {min}{unit}"),
            (None, Some(max)) => format!("<= {max}{unit}"),
            (None, None) if self.is_numeric() => format!("number{unit}"),
            (None, None) => "text".to_string(),
        }
    }
}
