//! # Sync Configuration
//!
//! Device identity and sync settings, stored as TOML in the platform config
//! directory.
//!
//! ## Configuration File Format
//! ```toml
//! # meridian/sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! branch = "JKT01"
//! operator = "OP7"
//! name = "Warehouse Scanner 3"
//!
//! [sync]
//! endpoint = "https://ops.example.com/api"
//! batch_size = 100
//! max_attempts = 10
//! ```
//!
//! The branch and operator feed the sequence allocator's scope, which is
//! how offline-created document ids stay collision-free across devices.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable unique id, generated on first run.
    pub id: String,

    /// Branch code embedded in allocated document ids.
    pub branch: String,

    /// Operator code embedded in allocated document ids.
    pub operator: String,

    /// Human-readable device name.
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            branch: String::new(),
            operator: String::new(),
            name: "unnamed-device".to_string(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Settings for upload passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Remote endpoint the gateway implementation talks to.
    pub endpoint: String,

    /// Maximum queue entries processed per pass.
    pub batch_size: u32,

    /// Entries past this many failed attempts are skipped (and logged) on
    /// later passes. They are never deleted.
    pub max_attempts: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            endpoint: String::new(),
            batch_size: 100,
            max_attempts: 10,
        }
    }
}

// =============================================================================
// Sync Configuration
// =============================================================================

/// Full sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub device: DeviceConfig,
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Resolves the default config file path
    /// (e.g. `~/.config/meridian/sync.toml` on Linux).
    pub fn default_path() -> SyncResult<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "meridian-ops", "meridian")
            .ok_or_else(|| SyncError::ConfigLoadFailed("no home directory".to_string()))?;
        Ok(dirs.config_dir().join("sync.toml"))
    }

    /// Loads configuration from a TOML file. A missing file yields the
    /// defaults (with a freshly generated device id), which `save` can then
    /// persist.
    pub fn load(path: &PathBuf) -> SyncResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no sync config; using defaults");
            return Ok(SyncConfig::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&raw)?;
        debug!(path = %path.display(), device = %config.device.id, "sync config loaded");
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &PathBuf) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        info!(path = %path.display(), "sync config saved");
        Ok(())
    }

    /// A device must know who it is before it may allocate document ids or
    /// upload.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.branch.is_empty() {
            return Err(SyncError::InvalidConfig("device.branch is empty".to_string()));
        }
        if self.device.operator.is_empty() {
            return Err(SyncError::InvalidConfig("device.operator is empty".to_string()));
        }
        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig("sync.batch_size must be > 0".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_generate_device_id() {
        let a = SyncConfig::default();
        let b = SyncConfig::default();
        assert!(!a.device.id.is_empty());
        assert_ne!(a.device.id, b.device.id);
        assert_eq!(a.sync.batch_size, 100);
    }

    #[test]
    fn test_validate_requires_identity() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_err());

        config.device.branch = "JKT01".to_string();
        assert!(config.validate().is_err());

        config.device.operator = "OP7".to_string();
        assert!(config.validate().is_ok());

        config.sync.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = SyncConfig::default();
        config.device.branch = "JKT01".to_string();
        config.device.operator = "OP7".to_string();
        config.sync.endpoint = "https://ops.example.com/api".to_string();

        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: SyncConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.device.branch, "JKT01");
        assert_eq!(parsed.sync.endpoint, "https://ops.example.com/api");
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("meridian-sync-config-does-not-exist.toml");
        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.sync.batch_size, 100);
    }
}
