//! Observation payload model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded value: numeric when the input parses as a finite number,
/// otherwise the original text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Number(f64),
    Text(String),
}

impl ObservationValue {
    /// Best-effort numeric parse of user input; never rejects
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Self::Number(number),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(_) => None,
        }
    }
}

/// Body queued for an observation create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPayload {
    pub study_id: String,
    pub plot_id: String,
    pub trait_id: String,
    pub value: ObservationValue,
    pub timestamp: DateTime<Utc>,
    pub notes: String,
}
