// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use async_trait::async_trait;
use storage_types::{FilesystemSpec, Redundancy};
use uuid::Uuid;

use crate::StorageError;

/// Everything the lower layer needs to bring a new pool up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSetup {
    pub uuid: Uuid,
    pub name: String,
    pub redundancy: Redundancy,
    pub devices: Vec<PathBuf>,
}

/// Lower layer that owns device I/O and thin-provisioning.
///
/// The lifecycle core calls into this trait *before* committing any registry
/// change, so an `Err` here always leaves the registries untouched.
#[async_trait]
pub trait PoolOpsAdapter: Send + Sync {
    async fn setup_pool(&self, setup: &PoolSetup) -> Result<(), StorageError>;

    async fn teardown_pool(&self, pool: Uuid) -> Result<(), StorageError>;

    async fn add_devices(&self, pool: Uuid, devices: &[PathBuf]) -> Result<(), StorageError>;

    async fn create_filesystem(
        &self,
        pool: Uuid,
        filesystem: Uuid,
        spec: &FilesystemSpec,
    ) -> Result<(), StorageError>;

    async fn destroy_filesystem(&self, pool: Uuid, filesystem: Uuid) -> Result<(), StorageError>;
}
