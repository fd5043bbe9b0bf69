// SPDX-License-Identifier: GPL-3.0-only

//! Daemon configuration
//!
//! Resolution order: an explicit `--config` path, then `$STORAGE_POOLD_CONFIG`,
//! then [`SYSTEM_CONFIG_PATH`] when it exists, then built-in defaults. Every
//! key is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zbus::names::WellKnownName;
use zbus::zvariant::ObjectPath;

use crate::error::{Result, ServiceError};

pub const CONFIG_ENV: &str = "STORAGE_POOLD_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/storage-poold/config.toml";

pub const DEFAULT_BUS_NAME: &str = "org.storage.Pools1";
pub const DEFAULT_OBJECT_ROOT: &str = "/org/storage/Pools1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbusConfig {
    pub bus: BusKind,
    pub name: String,
    pub object_root: String,
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            name: DEFAULT_BUS_NAME.to_string(),
            object_root: DEFAULT_OBJECT_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Odds of an injected device-add failure are `1 / denominator`; `0` disables injection.
    pub denominator: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub dbus: DbusConfig,
    pub logging: LoggingConfig,
    pub simulator: SimulatorConfig,
}

impl ServiceConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ServiceError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Pick the config source. `env_path` is the value of [`CONFIG_ENV`].
    pub fn resolve(explicit: Option<&Path>, env_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env_path {
            return Self::load(&path);
        }
        let system = Path::new(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Self::load(system);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        WellKnownName::try_from(self.dbus.name.as_str()).map_err(|e| {
            ServiceError::ConfigValue {
                key: "dbus.name",
                message: e.to_string(),
            }
        })?;

        let root = self.dbus.object_root.as_str();
        ObjectPath::try_from(root).map_err(|e| ServiceError::ConfigValue {
            key: "dbus.object_root",
            message: e.to_string(),
        })?;
        if root == "/" {
            return Err(ServiceError::ConfigValue {
                key: "dbus.object_root",
                message: "must not be the bus root".to_string(),
            });
        }

        if self.logging.level.trim().is_empty() {
            return Err(ServiceError::ConfigValue {
                key: "logging.level",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
