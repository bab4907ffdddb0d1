//! Data models for fieldsync

mod observation;
mod plot;
mod settings;
mod sync_action;
mod sync_run;
mod traits;

pub use observation::{ObservationPayload, ObservationValue};
pub use plot::Plot;
pub use settings::Settings;
pub use sync_action::{
    ActionId, ActionState, ActionType, EntityType, NewSyncAction, PendingSyncAction,
};
pub use sync_run::{QueueStats, SyncRun};
pub use traits::{Trait, TraitDataType};

/// Wall-clock time in Unix milliseconds, the unit of every stored timestamp
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
