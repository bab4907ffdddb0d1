//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fieldsync_core::config::ClientConfig;
use fieldsync_core::sync::RejectionPolicy;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

/// Server settings for one profile; unset tuning fields fall back to the
/// client defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_policy: Option<RejectionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_secs: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("fieldsync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    fieldsync_core::config::non_blank(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) =
            normalize_profile_name(std::env::var("FIELDSYNC_PROFILE").ok().as_deref())
        {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Validated client config, with `api_base_url_override` replacing the
    /// stored base URL when set
    pub fn client_config(
        &self,
        api_base_url_override: Option<String>,
    ) -> Result<ClientConfig, String> {
        let defaults = ClientConfig::default();
        ClientConfig {
            api_base_url: normalize_text_option(api_base_url_override)
                .or_else(|| self.api_base_url.clone()),
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            rejection_policy: self.rejection_policy.unwrap_or(defaults.rejection_policy),
            retry_base_secs: self.retry_base_secs.unwrap_or(defaults.retry_base_secs),
            retry_max_secs: self.retry_max_secs.unwrap_or(defaults.retry_max_secs),
        }
        .normalized()
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" field ")), Some("field".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" station ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "station".to_string(),
            CliProfile {
                api_base_url: Some(" https://brapi.example.org/ ".to_string()),
                retry_max_secs: Some(60),
                ..CliProfile::default()
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("station"));
        let profile = loaded.profile("station").unwrap();
        assert_eq!(
            profile.api_base_url.as_deref(),
            Some("https://brapi.example.org")
        );
        assert_eq!(profile.retry_max_secs, Some(60));
        assert_eq!(profile.request_timeout_secs, None);
    }

    #[test]
    fn missing_config_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("north-field".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("lab")), "lab");
        if std::env::var_os("FIELDSYNC_PROFILE").is_none() {
            assert_eq!(config.resolve_profile_name(None), "north-field");
        }
    }

    #[test]
    fn client_config_fills_defaults_and_honours_override() {
        let profile = CliProfile {
            api_base_url: Some("https://stored.example.org".to_string()),
            request_timeout_secs: Some(30),
            ..CliProfile::default()
        };

        let stored = profile.client_config(None).unwrap();
        assert_eq!(
            stored.api_base_url.as_deref(),
            Some("https://stored.example.org")
        );
        assert_eq!(stored.request_timeout(), Duration::from_secs(30));
        assert_eq!(stored.retry_base_secs, ClientConfig::default().retry_base_secs);

        let overridden = profile
            .client_config(Some("http://localhost:8080/".to_string()))
            .unwrap();
        assert_eq!(
            overridden.api_base_url.as_deref(),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn client_config_rejects_invalid_values() {
        let profile = CliProfile {
            api_base_url: Some("ftp://brapi.example.org".to_string()),
            ..CliProfile::default()
        };
        assert!(profile.client_config(None).is_err());

        let profile = CliProfile {
            retry_base_secs: Some(120),
            retry_max_secs: Some(10),
            ..CliProfile::default()
        };
        assert!(profile.client_config(None).is_err());
    }
}
