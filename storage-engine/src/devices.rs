// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// A device list that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceSet(Vec<PathBuf>);

impl DeviceSet {
    /// Validate `requested` in order, reporting the first problem found.
    ///
    /// `owner_of` returns the name of the live pool that owns a device, if any.
    pub fn validate<'o, F>(requested: &[PathBuf], allow_empty: bool, owner_of: F) -> Result<Self>
    where
        F: Fn(&Path) -> Option<&'o str>,
    {
        if requested.is_empty() && !allow_empty {
            return Err(EngineError::EmptyDeviceSet);
        }

        let mut seen = HashSet::with_capacity(requested.len());
        for device in requested {
            if !device.is_absolute() {
                return Err(EngineError::RelativeDevicePath(
                    device.display().to_string(),
                ));
            }
            if !seen.insert(device.as_path()) {
                return Err(EngineError::DuplicateDevice(device.display().to_string()));
            }
            if let Some(pool) = owner_of(device) {
                return Err(EngineError::DeviceInUse {
                    device: device.display().to_string(),
                    pool: pool.to_string(),
                });
            }
        }

        Ok(Self(requested.to_vec()))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.0
    }
}
