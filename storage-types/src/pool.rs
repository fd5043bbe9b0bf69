// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Identifier;

/// Data-protection scheme of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Redundancy {
    #[default]
    None = 0,
}

impl Redundancy {
    pub const ALL: [Redundancy; 1] = [Redundancy::None];

    pub fn value(self) -> u16 {
        self as u16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
        }
    }
}

impl TryFrom<u16> for Redundancy {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.value() == value)
            .ok_or(value)
    }
}

/// Point-in-time view of a live pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub id: Identifier,
    pub uuid: Uuid,
    pub name: String,
    pub redundancy: Redundancy,
    /// Owned block devices, in the order they joined the pool.
    pub devices: Vec<String>,
    pub filesystem_count: usize,
    pub created: DateTime<Utc>,
}
