//! Pending sync action model
//!
//! A pending sync action is the durable, write-ahead record of one user
//! mutation that still has to reach the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// A unique identifier for a queued action, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Create a new unique action ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Kind of remote mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Create,
    Update,
}

/// Remote resource a queued action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Observation,
    Germplasm,
    Trial,
    Study,
    Cross,
    Image,
    Sample,
}

/// Lifecycle state of a row in the queue table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Waiting to be sent
    #[default]
    Pending,
    /// Durably rejected by the server; parked until the user requeues or discards it
    DeadLetter,
}

macro_rules! impl_storage_str {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Storage representation
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} '{other}'",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

impl_storage_str!(ActionType {
    Create => "CREATE",
    Update => "UPDATE",
});

impl_storage_str!(EntityType {
    Observation => "OBSERVATION",
    Germplasm => "GERMPLASM",
    Trial => "TRIAL",
    Study => "STUDY",
    Cross => "CROSS",
    Image => "IMAGE",
    Sample => "SAMPLE",
});

impl_storage_str!(ActionState {
    Pending => "pending",
    DeadLetter => "dead_letter",
});

/// An action about to be appended to the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSyncAction {
    /// Pre-generated identifier, also used as the idempotency key on the wire
    pub id: ActionId,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    /// Resource body sent to the server
    pub payload: serde_json::Value,
}

impl NewSyncAction {
    /// Build a new action with a fresh identifier
    pub fn new(action_type: ActionType, entity_type: EntityType, payload: serde_json::Value) -> Self {
        Self {
            id: ActionId::new(),
            action_type,
            entity_type,
            payload,
        }
    }

    /// Convenience constructor for observation creates
    pub fn create_observation(payload: serde_json::Value) -> Self {
        Self::new(ActionType::Create, EntityType::Observation, payload)
    }
}

/// A durable queue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSyncAction {
    pub id: ActionId,
    /// Store-assigned order key; strictly increasing across enqueues and restarts
    pub sequence: i64,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub payload: serde_json::Value,
    /// Enqueue time (Unix ms)
    pub enqueued_at: i64,
    /// Number of failed send attempts
    pub attempts: i64,
    /// Most recent failure message
    pub last_error: Option<String>,
    /// Most recent attempt time (Unix ms)
    pub last_attempt_at: Option<i64>,
    pub state: ActionState,
}

impl PendingSyncAction {
    /// Whether the action is waiting in the drain queue
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, ActionState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_id_unique_and_parseable() {
        let first = ActionId::new();
        let second = ActionId::new();
        assert_ne!(first, second);

        let parsed: ActionId = first.as_str().parse().unwrap();
        assert_eq!(parsed, first);
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActionType::Create).unwrap(),
            "\"CREATE\""
        );
        assert_eq!(
            serde_json::to_string(&EntityType::Observation).unwrap(),
            "\"OBSERVATION\""
        );
        assert_eq!(
            serde_json::to_string(&ActionState::DeadLetter).unwrap(),
            "\"dead_letter\""
        );
    }

    #[test]
    fn storage_strings_round_trip() {
        assert_eq!("UPDATE".parse::<ActionType>().unwrap(), ActionType::Update);
        assert_eq!(
            EntityType::Sample.as_str().parse::<EntityType>().unwrap(),
            EntityType::Sample
        );
        assert!("observation".parse::<EntityType>().is_err());
    }
}
