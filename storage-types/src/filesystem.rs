// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Identifier;

/// One entry of a filesystem creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemSpec {
    pub name: String,
    /// Size hint in bytes. Passed to the lower layer, not interpreted here.
    pub size: Option<u64>,
}

impl FilesystemSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    pub fn with_size(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
        }
    }
}

/// Point-in-time view of a live filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemInfo {
    pub id: Identifier,
    pub uuid: Uuid,
    pub name: String,
    pub pool: Identifier,
    pub size: Option<u64>,
    pub created: DateTime<Utc>,
}
