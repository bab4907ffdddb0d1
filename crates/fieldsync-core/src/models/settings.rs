//! Device settings model

use serde::{Deserialize, Serialize};

/// Per-device settings persisted in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Drain the queue automatically when connectivity returns
    pub auto_sync: bool,
    /// Trial used to scope numeric plot scans
    pub active_trial_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            active_trial_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.auto_sync);
        assert!(settings.active_trial_id.is_none());
    }
}
