// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::{FilesystemInfo, Identifier, PoolInfo};

/// Consistent snapshot of every live pool and filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManagedObjects {
    pub pools: Vec<PoolInfo>,
    pub filesystems: Vec<FilesystemInfo>,
}

impl ManagedObjects {
    pub fn pools(&self) -> impl Iterator<Item = &PoolInfo> {
        self.pools.iter()
    }

    pub fn filesystems(&self) -> impl Iterator<Item = &FilesystemInfo> {
        self.filesystems.iter()
    }

    pub fn filesystems_of<'a>(
        &'a self,
        pool: &'a Identifier,
    ) -> impl Iterator<Item = &'a FilesystemInfo> + 'a {
        self.filesystems.iter().filter(move |fs| &fs.pool == pool)
    }
}
