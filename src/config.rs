//! Configuration module
//!
//! Two layers, both TOML on disk:
//! - [`StationConfig`]: static identity of the charge point (vendor, model,
//!   serials, firmware) plus stack tuning. Read at startup, never written
//!   by this crate.
//! - [`FileSettings`]: the runtime settings the stack itself persists: the
//!   heartbeat interval handed out by the Central System and the internal
//!   key/value records. Exposed through the [`OcppConfig`] and
//!   [`InternalConfig`] collaborator traits so hosts can substitute their
//!   own storage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DomainError, DomainResult};

/// Static charge-point identity and stack tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Vendor reported in BootNotification (CiString20)
    #[serde(default = "default_vendor")]
    pub charge_point_vendor: String,

    /// Model reported in BootNotification (CiString20)
    #[serde(default = "default_model")]
    pub charge_point_model: String,

    /// Serial number of the charge point
    #[serde(default)]
    pub charge_point_serial_number: Option<String>,

    /// Serial number of the charge box enclosure
    #[serde(default)]
    pub charge_box_serial_number: Option<String>,

    /// Installed firmware version
    #[serde(default)]
    pub firmware_version: Option<String>,

    /// SIM card ICCID, for modem-equipped stations
    #[serde(default)]
    pub iccid: Option<String>,

    /// SIM card IMSI
    #[serde(default)]
    pub imsi: Option<String>,

    /// Energy meter serial number
    #[serde(default)]
    pub meter_serial_number: Option<String>,

    /// Energy meter type
    #[serde(default)]
    pub meter_type: Option<String>,

    /// Number of physical connectors
    #[serde(default = "default_connector_count")]
    pub connector_count: u32,

    /// Delay before retrying a failed BootNotification (seconds)
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

// ── Default value helpers ──────────────────────────────────────

fn default_vendor() -> String {
    "OpenStation".into()
}
fn default_model() -> String {
    "CP-1".into()
}
fn default_connector_count() -> u32 {
    1
}
fn default_retry_interval() -> u64 {
    30
}
fn default_heartbeat_interval() -> u64 {
    300
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            charge_point_vendor: default_vendor(),
            charge_point_model: default_model(),
            charge_point_serial_number: None,
            charge_box_serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            meter_serial_number: None,
            meter_type: None,
            connector_count: default_connector_count(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

impl StationConfig {
    /// Load from a TOML file, creating it with defaults if missing.
    pub fn load(path: &Path) -> DomainResult<Self> {
        let cfg: Self = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| DomainError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
            toml::from_str(&content).map_err(|e| {
                DomainError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e))
            })?
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            cfg
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to a TOML file.
    pub fn save(&self, path: &Path) -> DomainResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DomainError::ConfigError(format!("Cannot create dirs {}: {}", parent.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DomainError::ConfigError(format!("Serialization error: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            DomainError::ConfigError(format!("Cannot write {}: {}", path.display(), e))
        })
    }

    /// Validate the configuration for common mistakes.
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();

        if self.charge_point_vendor.is_empty() || self.charge_point_vendor.len() > 20 {
            errors.push(format!(
                "Vendor must be 1..=20 characters (got {})",
                self.charge_point_vendor.len()
            ));
        }
        if self.charge_point_model.is_empty() || self.charge_point_model.len() > 20 {
            errors.push(format!(
                "Model must be 1..=20 characters (got {})",
                self.charge_point_model.len()
            ));
        }
        for (name, value) in [
            ("charge_point_serial_number", &self.charge_point_serial_number),
            ("charge_box_serial_number", &self.charge_box_serial_number),
            ("meter_serial_number", &self.meter_serial_number),
        ] {
            if let Some(v) = value {
                if v.len() > 25 {
                    errors.push(format!("{} exceeds 25 characters", name));
                }
            }
        }
        if self.connector_count == 0 {
            errors.push("Connector count must be at least 1".to_string());
        }
        if self.retry_interval_secs == 0 || self.retry_interval_secs > 3600 {
            errors.push(format!(
                "Retry interval ({}) must be between 1 and 3600 seconds",
                self.retry_interval_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::ConfigError(format!(
                "Configuration validation failed:\n  • {}",
                errors.join("\n  • ")
            )))
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

// ── Collaborator traits ────────────────────────────────────────

/// Standard OCPP configuration keys the status stack reads and writes.
pub trait OcppConfig: Send + Sync {
    /// Currently configured heartbeat interval.
    fn heartbeat_interval(&self) -> Duration;

    /// Store the heartbeat interval handed out by the Central System.
    /// Implementations persist the new value.
    fn set_heartbeat_interval(&self, interval: Duration);

    /// Debounce window for connector status changes; zero disables it.
    fn minimum_status_duration(&self) -> Duration;
}

/// Durable internal key/value records (non-OCPP, stack-private).
pub trait InternalConfig: Send + Sync {
    fn set_key(&self, key: &str, value: &str) -> DomainResult<()>;
    fn get_key(&self, key: &str) -> Option<String>;
}

// ── File-backed settings ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default = "default_heartbeat_interval")]
    heartbeat_interval_secs: u64,

    #[serde(default)]
    minimum_status_duration_secs: u64,

    #[serde(default)]
    internal: BTreeMap<String, String>,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            minimum_status_duration_secs: 0,
            internal: BTreeMap::new(),
        }
    }
}

/// TOML-file implementation of [`OcppConfig`] and [`InternalConfig`].
pub struct FileSettings {
    path: PathBuf,
    data: RwLock<SettingsData>,
}

impl FileSettings {
    /// Load from a TOML file, creating it with defaults if missing.
    pub fn load(path: impl Into<PathBuf>) -> DomainResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                DomainError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
            })?;
            toml::from_str(&content).map_err(|e| {
                DomainError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e))
            })?
        } else {
            SettingsData::default()
        };
        let settings = Self {
            path,
            data: RwLock::new(data),
        };
        settings.persist()?;
        Ok(settings)
    }

    fn persist(&self) -> DomainResult<()> {
        let data = self.data.read().expect("settings lock");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DomainError::ConfigError(format!("Cannot create dirs {}: {}", parent.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(&*data)
            .map_err(|e| DomainError::ConfigError(format!("Serialization error: {}", e)))?;
        std::fs::write(&self.path, content).map_err(|e| {
            DomainError::ConfigError(format!("Cannot write {}: {}", self.path.display(), e))
        })
    }
}

impl OcppConfig for FileSettings {
    fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.data.read().expect("settings lock").heartbeat_interval_secs)
    }

    fn set_heartbeat_interval(&self, interval: Duration) {
        {
            let mut data = self.data.write().expect("settings lock");
            data.heartbeat_interval_secs = interval.as_secs();
        }
        if let Err(e) = self.persist() {
            warn!(error = %e, "Failed to persist heartbeat interval");
        }
    }

    fn minimum_status_duration(&self) -> Duration {
        Duration::from_secs(
            self.data
                .read()
                .expect("settings lock")
                .minimum_status_duration_secs,
        )
    }
}

impl InternalConfig for FileSettings {
    fn set_key(&self, key: &str, value: &str) -> DomainResult<()> {
        {
            let mut data = self.data.write().expect("settings lock");
            data.internal.insert(key.to_string(), value.to_string());
        }
        self.persist()
    }

    fn get_key(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .expect("settings lock")
            .internal
            .get(key)
            .cloned()
    }
}

/// Default settings location under the user's config directory.
pub fn default_settings_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-station")
        .join("settings.toml")
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("ocpp_station_config_tests");
        let _ = std::fs::create_dir_all(&dir);
        dir.join(name)
    }

    #[test]
    fn default_config_validates() {
        assert!(StationConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_vendor_is_error() {
        let mut cfg = StationConfig::default();
        cfg.charge_point_vendor = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Vendor"));
    }

    #[test]
    fn long_model_is_error() {
        let mut cfg = StationConfig::default();
        cfg.charge_point_model = "M".repeat(21);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Model"));
    }

    #[test]
    fn long_serial_is_error() {
        let mut cfg = StationConfig::default();
        cfg.charge_point_serial_number = Some("S".repeat(26));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("charge_point_serial_number"));
    }

    #[test]
    fn zero_connectors_is_error() {
        let mut cfg = StationConfig::default();
        cfg.connector_count = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Connector count"));
    }

    #[test]
    fn retry_interval_out_of_range() {
        let mut cfg = StationConfig::default();
        cfg.retry_interval_secs = 0;
        assert!(cfg.validate().is_err());
        cfg.retry_interval_secs = 7200;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn multiple_validation_errors_are_collected() {
        let mut cfg = StationConfig::default();
        cfg.charge_point_vendor = String::new();
        cfg.connector_count = 0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("•"));
        assert!(err.contains("Vendor"));
        assert!(err.contains("Connector count"));
    }

    #[test]
    fn station_config_save_and_reload() {
        let path = temp_path("station.toml");
        let _ = std::fs::remove_file(&path);

        let mut cfg = StationConfig::default();
        cfg.firmware_version = Some("1.4.2".into());
        cfg.save(&path).unwrap();

        let loaded = StationConfig::load(&path).unwrap();
        assert_eq!(loaded.firmware_version.as_deref(), Some("1.4.2"));
        assert_eq!(loaded.charge_point_model, cfg.charge_point_model);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn station_config_load_creates_defaults() {
        let path = temp_path("station_fresh.toml");
        let _ = std::fs::remove_file(&path);

        let cfg = StationConfig::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.connector_count, default_connector_count());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn settings_persist_heartbeat_interval() {
        let path = temp_path("settings_hb.toml");
        let _ = std::fs::remove_file(&path);

        let settings = FileSettings::load(&path).unwrap();
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(300));
        settings.set_heartbeat_interval(Duration::from_secs(120));

        let reloaded = FileSettings::load(&path).unwrap();
        assert_eq!(reloaded.heartbeat_interval(), Duration::from_secs(120));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn settings_persist_internal_keys() {
        let path = temp_path("settings_kv.toml");
        let _ = std::fs::remove_file(&path);

        let settings = FileSettings::load(&path).unwrap();
        assert_eq!(settings.get_key("LastRegistrationStatus"), None);
        settings.set_key("LastRegistrationStatus", "Accepted").unwrap();

        let reloaded = FileSettings::load(&path).unwrap();
        assert_eq!(
            reloaded.get_key("LastRegistrationStatus").as_deref(),
            Some("Accepted")
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn default_settings_path_is_namespaced() {
        let path = default_settings_path();
        assert!(path.ends_with("ocpp-station/settings.toml"));
    }

    #[test]
    fn minimum_status_duration_defaults_to_zero() {
        let path = temp_path("settings_msd.toml");
        let _ = std::fs::remove_file(&path);

        let settings = FileSettings::load(&path).unwrap();
        assert_eq!(settings.minimum_status_duration(), Duration::ZERO);

        let _ = std::fs::remove_file(&path);
    }
}
